//! Error types for the ingestion pipeline.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised while decoding records from an input file.
///
/// Every variant is fatal for the file being read; the caller decides
/// whether the run skips to the next file or aborts.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated length prefix: got {got} of 4 bytes")]
    TruncatedPrefix { got: usize },

    #[error("truncated payload: expected {expected} bytes, got {got}")]
    TruncatedPayload { expected: usize, got: usize },

    #[error("invalid record length: {0}")]
    InvalidLength(i32),

    #[error("record of {len} bytes exceeds limit of {max} bytes")]
    RecordTooLarge { len: usize, max: usize },

    #[error("missing doc ID and/or header line in record {record}")]
    MissingMetadata { record: u64 },
}

/// Errors related to chunking a single document.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("header uses {header_tokens} tokens, leaving no room in a budget of {budget}")]
    HeaderExceedsBudget { header_tokens: usize, budget: usize },

    #[error("document has neither header nor body")]
    EmptyDocument,
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            // 429 and gateway errors from an overloaded server
            EmbeddingError::ServerError(msg) => {
                msg.contains("503")
                    || msg.contains("502")
                    || msg.contains("504")
                    || msg.contains("429")
                    || msg.to_lowercase().contains("unavailable")
                    || msg.to_lowercase().contains("too many requests")
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("upsert error: {0}")]
    UpsertError(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::ConnectionError(_) => true,
            VectorStoreError::CollectionError(msg) | VectorStoreError::UpsertError(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("timeout")
                    || msg_lower.contains("connection")
                    || msg_lower.contains("unavailable")
                    || msg_lower.contains("too many")
            }
        }
    }
}

/// Errors that stop a batch from being stored.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("upsert failed: {0}")]
    Upsert(#[from] VectorStoreError),

    #[error("embedding service returned {got} vectors for {expected} texts")]
    VectorCountMismatch { expected: usize, got: usize },
}

/// Errors that end an ingestion run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("batch {batch} failed: {source}")]
    BatchFailed {
        batch: u64,
        #[source]
        source: BatchError,
    },

    #[error("worker pool closed before all batches were submitted")]
    PoolClosed,

    #[error("malformed input {file}: {source}")]
    MalformedFile {
        file: String,
        #[source]
        source: DecodeError,
    },

    #[error("failed to open input {file}: {source}")]
    OpenFile {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker task failed: {0}")]
    TaskFailed(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),
}
