//! Command-line interface for corpus ingestion.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::{Config, OutputFormat};

/// Chunk, embed and store document corpora in a vector database.
#[derive(Debug, Parser)]
#[command(name = "corpus-ingest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'c', global = true, env = "CORPUS_INGEST_CONFIG", help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(long, global = true, env = "EMBEDDING_URL", help = "Embedding server base URL")]
    pub embedding_url: Option<String>,

    #[arg(long, global = true, env = "EMBEDDING_API_KEY", hide_env_values = true, hide = true)]
    pub embedding_api_key: Option<String>,

    #[arg(long, global = true, env = "QDRANT_URL", help = "Qdrant gRPC URL")]
    pub qdrant_url: Option<String>,

    #[arg(long, global = true, env = "QDRANT_API_KEY", hide_env_values = true, hide = true)]
    pub qdrant_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Apply connection overrides from flags and the environment.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref url) = self.embedding_url {
            config.embedding.url = url.clone();
        }
        if let Some(ref key) = self.embedding_api_key {
            config.embedding.api_key = Some(key.clone());
        }
        if let Some(ref url) = self.qdrant_url {
            config.vector_store.url = url.clone();
        }
        if let Some(ref key) = self.qdrant_api_key {
            config.vector_store.api_key = Some(key.clone());
        }
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest a directory (or single file) of corpus records
    Ingest(commands::IngestArgs),

    /// Check embedding server and Qdrant status
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
