use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use corpus_ingest::cli::commands::{ConfigCommand, handle_config, handle_ingest, handle_status};
use corpus_ingest::cli::output::render_error;
use corpus_ingest::cli::{Cli, Commands};
use corpus_ingest::models::{Config, OutputFormat};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("corpus_ingest={default_level},warn")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = cli.format.unwrap_or(OutputFormat::Text);
    if let Err(e) = run(cli, format).await {
        eprintln!("{}", render_error(format, &e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, format: OutputFormat) -> Result<()> {
    let mut config = match Config::load(cli.config.as_deref()) {
        // `config init --force` must be able to replace a broken file.
        Err(e) if matches!(cli.command, Commands::Config(ConfigCommand::Init { .. })) => {
            tracing::warn!(error = %e, "existing config unreadable, starting from defaults");
            Config::default()
        }
        result => result.context("failed to load config")?,
    };
    cli.apply_overrides(&mut config);

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_shutdown(shutdown.clone()));

    match cli.command {
        Commands::Ingest(args) => handle_ingest(args, config, format, shutdown).await,
        Commands::Status => handle_status(config, format).await,
        Commands::Config(cmd) => handle_config(cmd, &config, cli.config.as_deref(), format),
    }
}

/// First signal stops reading input and lets dispatched batches drain;
/// a second one exits immediately.
async fn watch_shutdown(shutdown: CancellationToken) {
    shutdown_signal().await;
    eprintln!("\nReceived shutdown signal, finishing in-flight batches...");
    shutdown.cancel();

    shutdown_signal().await;
    eprintln!("Received second shutdown signal, exiting");
    std::process::exit(130);
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
