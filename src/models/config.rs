use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "http://127.0.0.1:8000/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "intfloat/multilingual-e5-large";
pub const DEFAULT_EMBEDDING_DIMENSION: u64 = 1024;
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "docs-e5-large";
pub const DEFAULT_PASSAGE_PREFIX: &str = "passage: ";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("corpus-ingest").join("config.toml"))
    }

    /// Load from `path`, or from the default location when `path` is `None`.
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load_file(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.batch_size must be at least 1".to_string(),
            ));
        }
        if self.ingest.parallelism == 0 {
            return Err(ConfigError::ValidationError(
                "ingest.parallelism must be at least 1".to_string(),
            ));
        }
        if self.chunking.context_length == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.context_length must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        if self.chunking.tokenizer == TokenizerKind::HuggingFace
            && self.chunking.tokenizer_path.is_none()
        {
            return Err(ConfigError::ValidationError(
                "chunking.tokenizer_path is required for the huggingface tokenizer".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_dimension")]
    pub dimension: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_dimension() -> u64 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            api_key: None,
            timeout_secs: default_timeout(),
            dimension: default_dimension(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Create the collection before ingesting when it does not exist.
    #[serde(default)]
    pub create_collection: bool,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            create_collection: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TokenizerKind {
    /// Hugging Face `tokenizer.json`
    HuggingFace,
    /// About four characters per token
    Heuristic,
    /// Whitespace-separated words
    Words,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Token budget `T` of the embedding model.
    #[serde(default = "default_context_length")]
    pub context_length: usize,

    /// Instruction prefix the embedding model expects on passages.
    #[serde(default = "default_passage_prefix")]
    pub passage_prefix: String,

    #[serde(default = "default_tokenizer")]
    pub tokenizer: TokenizerKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
}

fn default_context_length() -> usize {
    512
}

fn default_passage_prefix() -> String {
    DEFAULT_PASSAGE_PREFIX.to_string()
}

fn default_tokenizer() -> TokenizerKind {
    TokenizerKind::Heuristic
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            context_length: default_context_length(),
            passage_prefix: default_passage_prefix(),
            tokenizer: default_tokenizer(),
            tokenizer_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum InputFormat {
    /// Choose per file from its extension
    Auto,
    /// Length-prefixed UTF-8 records
    Framed,
    /// One record per line
    Lines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LineIdScheme {
    /// `<file stem>:<line number>`
    LineNumber,
    /// Text before the first delimiter
    FirstField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failed batch, count its chunks as dropped and continue
    Drop,
    /// Stop the producer, drain in-flight batches and fail the run
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FilePolicy {
    /// Log the malformed file and continue with the next one
    Skip,
    /// Fail the run
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum IdScheme {
    Sequential,
    Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_input_pattern")]
    pub input_pattern: String,

    #[serde(default = "default_format")]
    pub format: InputFormat,

    #[serde(default = "default_line_id")]
    pub line_id: LineIdScheme,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent embedding + upsert tasks.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Flushed batches allowed to wait for a free worker.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    #[serde(default = "default_embedding_failure")]
    pub on_embedding_failure: FailurePolicy,

    #[serde(default = "default_malformed_file")]
    pub on_malformed_file: FilePolicy,

    #[serde(default = "default_id_scheme")]
    pub id_scheme: IdScheme,

    #[serde(default)]
    pub start_id: u64,

    #[serde(default = "default_store_source_content")]
    pub store_source_content: bool,

    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,

    /// Emit a progress line every N flushed batches.
    #[serde(default = "default_progress_every")]
    pub progress_every: u64,
}

fn default_input_pattern() -> String {
    "*.txt.gz".to_string()
}

fn default_format() -> InputFormat {
    InputFormat::Auto
}

fn default_line_id() -> LineIdScheme {
    LineIdScheme::LineNumber
}

fn default_batch_size() -> usize {
    128
}

fn default_parallelism() -> usize {
    4
}

fn default_queue_depth() -> usize {
    1
}

fn default_embedding_failure() -> FailurePolicy {
    FailurePolicy::Drop
}

fn default_malformed_file() -> FilePolicy {
    FilePolicy::Skip
}

fn default_id_scheme() -> IdScheme {
    IdScheme::Sequential
}

fn default_store_source_content() -> bool {
    true
}

fn default_max_record_bytes() -> usize {
    64 * 1024 * 1024
}

fn default_progress_every() -> u64 {
    1
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_pattern: default_input_pattern(),
            format: default_format(),
            line_id: default_line_id(),
            batch_size: default_batch_size(),
            parallelism: default_parallelism(),
            queue_depth: default_queue_depth(),
            on_embedding_failure: default_embedding_failure(),
            on_malformed_file: default_malformed_file(),
            id_scheme: default_id_scheme(),
            start_id: 0,
            store_source_content: default_store_source_content(),
            max_record_bytes: default_max_record_bytes(),
            progress_every: default_progress_every(),
        }
    }
}
