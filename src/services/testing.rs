//! In-memory collaborators for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::embedding::EmbeddingService;
use super::vector_store::{CollectionInfo, VectorStore};
use crate::error::{EmbeddingError, VectorStoreError};
use crate::models::Point;

/// Deterministic embedder that fails any batch containing [`Self::FAIL_MARKER`].
pub struct MockEmbedder {
    dimension: usize,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockEmbedder {
    pub const FAIL_MARKER: &'static str = "<<fail>>";

    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn vector_for(text: &str, dimension: usize) -> Vec<f32> {
        let len = text.len() as f32;
        (0..dimension).map(|i| len + i as f32).collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `embed` calls seen.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for MockEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if texts.iter().any(|t| t.contains(Self::FAIL_MARKER)) {
            return Err(EmbeddingError::ServerError("status 400: rejected".to_string()));
        }
        Ok(texts
            .iter()
            .map(|t| Self::vector_for(t, self.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Vector store keeping points in memory.
#[derive(Default)]
pub struct MemoryStore {
    points: Mutex<Vec<Point>>,
    batch_sizes: Mutex<Vec<usize>>,
    upsert_calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl MemoryStore {
    /// Fail the first `n` upserts with a transient error.
    pub fn failing_upserts(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            ..Default::default()
        }
    }

    pub fn points(&self) -> Vec<Point> {
        self.points.lock().unwrap().clone()
    }

    /// Sizes of successful upserts, in completion order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        Ok(Some(CollectionInfo {
            points_count: self.points.lock().unwrap().len() as u64,
        }))
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn upsert_points(&self, points: Vec<Point>) -> Result<(), VectorStoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(VectorStoreError::ConnectionError("connection reset".to_string()));
        }

        self.batch_sizes.lock().unwrap().push(points.len());
        self.points.lock().unwrap().extend(points);
        Ok(())
    }

    fn collection(&self) -> &str {
        "memory"
    }
}
