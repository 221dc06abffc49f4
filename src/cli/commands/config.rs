use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a configuration file with default values")]
    Init {
        #[arg(long, short = 'f', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show the configuration file path")]
    Path,
}

pub fn handle_config(
    cmd: ConfigCommand,
    config: &Config,
    explicit_path: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let formatter = get_formatter(format);
    let path = resolve_path(explicit_path)?;

    match cmd {
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }
            Config::default()
                .save(&path)
                .context("failed to write config")?;
            println!(
                "{}",
                formatter.format_message(&format!("Created config at: {}", path.display()))
            );
        }
        ConfigCommand::Show => {
            let mut shown = config.clone();
            mask_secrets(&mut shown);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&shown)?),
                OutputFormat::Text => {
                    println!("# {}", path.display());
                    print!("{}", toml::to_string_pretty(&shown)?);
                }
            }
        }
        ConfigCommand::Path => {
            let state = if path.exists() { "active" } else { "would be" };
            println!(
                "{}",
                formatter.format_message(&format!("Config ({}): {}", state, path.display()))
            );
        }
    }

    Ok(())
}

fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory")),
    }
}

fn mask_secrets(config: &mut Config) {
    for key in [&mut config.embedding.api_key, &mut config.vector_store.api_key] {
        if key.is_some() {
            *key = Some("********".to_string());
        }
    }
}
