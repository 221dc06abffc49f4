//! Destinations for embedded chunks.

mod qdrant;

pub use qdrant::QdrantBackend;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{Point, VectorStoreConfig};

#[derive(Debug, Clone)]
pub struct CollectionInfo {
    pub points_count: u64,
}

/// Destination for embedded points.
///
/// Upserts must be idempotent for identical `(id, vector, payload)` points.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// `Ok(true)` when the store answers.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// `None` when the target collection is missing.
    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError>;

    /// Create the target collection sized for the embedding dimension.
    /// A no-op when it already exists.
    async fn create_collection(&self) -> Result<(), VectorStoreError>;

    /// Insert or replace points in the collection.
    async fn upsert_points(&self, points: Vec<Point>) -> Result<(), VectorStoreError>;

    fn collection(&self) -> &str;
}

/// Build the store an ingest run writes to.
pub fn create_backend(
    config: &VectorStoreConfig,
    dimension: u64,
) -> Result<Box<dyn VectorStore>, VectorStoreError> {
    Ok(Box::new(QdrantBackend::new(config, dimension)?))
}
