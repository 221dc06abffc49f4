//! Ingest command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::output::get_formatter;
use crate::models::{
    Config, FailurePolicy, FilePolicy, IdScheme, InputFormat, LineIdScheme, OutputFormat,
};
use crate::services::{
    Chunker, EmbeddingClient, EmbeddingService, Pipeline, ProgressOutput, ProgressReporter,
    VectorStore, build_tokenizer, create_backend,
};
use crate::sources::discover_files;

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Directory to walk, or a single input file
    #[arg(required = true)]
    pub input: PathBuf,

    /// File name glob applied while walking the directory
    #[arg(long, short = 'p')]
    pub pattern: Option<String>,

    #[arg(long, value_enum)]
    pub input_format: Option<InputFormat>,

    #[arg(long, value_enum)]
    pub line_id: Option<LineIdScheme>,

    #[arg(long, short = 'b')]
    pub batch_size: Option<usize>,

    /// Concurrent embedding + upsert tasks
    #[arg(long, short = 'j')]
    pub parallelism: Option<usize>,

    #[arg(long)]
    pub collection: Option<String>,

    /// Token budget per chunk, header included
    #[arg(long)]
    pub context_length: Option<usize>,

    #[arg(long, value_enum)]
    pub on_embedding_failure: Option<FailurePolicy>,

    #[arg(long, value_enum)]
    pub on_malformed_file: Option<FilePolicy>,

    #[arg(long, value_enum)]
    pub id_scheme: Option<IdScheme>,

    /// First sequential id, to append to an existing collection
    #[arg(long)]
    pub start_id: Option<u64>,

    /// Create the collection if it does not exist
    #[arg(long)]
    pub create_collection: bool,

    /// Do not store the source document in each point's payload
    #[arg(long)]
    pub no_source_content: bool,

    /// List the files that would be ingested and exit
    #[arg(long)]
    pub dry_run: bool,
}

impl IngestArgs {
    fn apply(&self, config: &mut Config) {
        let ingest = &mut config.ingest;
        if let Some(ref pattern) = self.pattern {
            ingest.input_pattern = pattern.clone();
        }
        if let Some(format) = self.input_format {
            ingest.format = format;
        }
        if let Some(line_id) = self.line_id {
            ingest.line_id = line_id;
        }
        if let Some(batch_size) = self.batch_size {
            ingest.batch_size = batch_size;
        }
        if let Some(parallelism) = self.parallelism {
            ingest.parallelism = parallelism;
        }
        if let Some(policy) = self.on_embedding_failure {
            ingest.on_embedding_failure = policy;
        }
        if let Some(policy) = self.on_malformed_file {
            ingest.on_malformed_file = policy;
        }
        if let Some(scheme) = self.id_scheme {
            ingest.id_scheme = scheme;
        }
        if let Some(start_id) = self.start_id {
            ingest.start_id = start_id;
        }
        if self.no_source_content {
            ingest.store_source_content = false;
        }
        if let Some(ref collection) = self.collection {
            config.vector_store.collection = collection.clone();
        }
        if self.create_collection {
            config.vector_store.create_collection = true;
        }
        if let Some(context_length) = self.context_length {
            config.chunking.context_length = context_length;
        }
    }
}

pub async fn handle_ingest(
    args: IngestArgs,
    mut config: Config,
    format: OutputFormat,
    shutdown: CancellationToken,
) -> Result<()> {
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;
    let formatter = get_formatter(format);

    let files = discover_files(&args.input, &config.ingest.input_pattern)?;
    if files.is_empty() {
        println!(
            "{}",
            formatter.format_message(&format!(
                "No files matching '{}' under {}",
                config.ingest.input_pattern,
                args.input.display()
            ))
        );
        return Ok(());
    }

    if args.dry_run {
        println!(
            "{}",
            formatter.format_message(&format!("Dry run: would ingest {} files", files.len()))
        );
        for file in &files {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    let tokenizer = build_tokenizer(&config.chunking)?;
    let chunker = Chunker::from_config(tokenizer, &config.chunking);
    let embedder: Arc<dyn EmbeddingService> = Arc::new(EmbeddingClient::new(&config.embedding)?);
    let store: Arc<dyn VectorStore> =
        Arc::from(create_backend(&config.vector_store, config.embedding.dimension)?);

    if config.vector_store.create_collection {
        store
            .create_collection()
            .await
            .context("failed to create collection")?;
    } else if store.get_collection_info().await?.is_none() {
        anyhow::bail!(
            "collection '{}' does not exist; pass --create-collection to create it",
            store.collection()
        );
    }

    let output = match format {
        OutputFormat::Text => ProgressOutput::Stdout,
        OutputFormat::Json => ProgressOutput::Log,
    };
    let progress = Arc::new(ProgressReporter::new(config.ingest.progress_every, output));
    let pipeline = Pipeline::new(&config, chunker, embedder, store, progress)
        .with_stop_token(shutdown);

    info!(
        files = files.len(),
        collection = %config.vector_store.collection,
        batch_size = config.ingest.batch_size,
        parallelism = config.ingest.parallelism,
        "ingesting"
    );
    let report = pipeline.run(files).await?;
    print!("{}", formatter.format_report(&report));

    Ok(())
}
