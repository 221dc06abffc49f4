mod config;
mod document;
mod report;

pub use config::{
    ChunkingConfig, Config, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL, DEFAULT_PASSAGE_PREFIX, DEFAULT_QDRANT_URL,
    EmbeddingConfig, FailurePolicy, FilePolicy, IdScheme, IngestConfig, InputFormat,
    LineIdScheme, TokenizerKind, VectorStoreConfig,
};
pub use document::{Batch, Chunk, Document, Point, PointId, PointPayload};
pub use report::{IngestReport, OutputFormat};
