//! Batch assembly and the per-batch embed + upsert task.

use std::sync::Arc;

use tracing::{debug, error};

use super::embedding::EmbeddingService;
use super::ids::{IdAllocator, PointIdMapper};
use super::progress::ProgressReporter;
use super::vector_store::VectorStore;
use crate::error::{BatchError, PipelineError};
use crate::models::{Batch, Chunk, FailurePolicy, Point, PointPayload};
use crate::utils::retry::{RetryConfig, with_retry};

/// Groups chunks into batches of at least `threshold` chunks.
///
/// The threshold is checked after each whole document, so a document's
/// chunks always land in the same batch and a batch may run past the
/// threshold by up to one document.
#[derive(Debug)]
pub struct BatchAccumulator {
    threshold: usize,
    current: Batch,
    next_sequence: u64,
}

impl BatchAccumulator {
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            current: Batch::with_capacity(0, threshold),
            next_sequence: 0,
        }
    }

    /// Add one document's chunks, returning a batch when the threshold is reached.
    pub fn push_document(
        &mut self,
        chunks: Vec<Chunk>,
        source_content: Option<Arc<str>>,
    ) -> Option<Batch> {
        for chunk in chunks {
            self.current.push(chunk, source_content.clone());
        }
        if self.current.len() >= self.threshold {
            self.take()
        } else {
            None
        }
    }

    /// Flush whatever is left once the input is exhausted.
    pub fn finish(&mut self) -> Option<Batch> {
        if self.current.is_empty() {
            None
        } else {
            self.take()
        }
    }

    pub fn pending(&self) -> usize {
        self.current.len()
    }

    fn take(&mut self) -> Option<Batch> {
        self.next_sequence += 1;
        let next = Batch::with_capacity(self.next_sequence, self.threshold);
        Some(std::mem::replace(&mut self.current, next))
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Upserted(usize),
    Dropped(usize),
}

/// Everything a worker needs to embed and store a batch.
pub struct BatchProcessor {
    pub embedder: Arc<dyn EmbeddingService>,
    pub store: Arc<dyn VectorStore>,
    pub ids: Arc<IdAllocator>,
    pub id_mapper: PointIdMapper,
    /// Stripped from the embedded text before storing it.
    pub passage_prefix: String,
    pub upsert_retry: RetryConfig,
    pub on_failure: FailurePolicy,
    pub progress: Arc<ProgressReporter>,
}

impl BatchProcessor {
    /// Process `batch` and apply the failure policy.
    pub async fn run(&self, batch: Batch) -> Result<BatchOutcome, PipelineError> {
        let sequence = batch.sequence;
        let len = batch.len();

        match self.process(batch).await {
            Ok(()) => {
                debug!(batch = sequence, points = len, "batch stored");
                self.progress.points_upserted(len);
                Ok(BatchOutcome::Upserted(len))
            }
            Err(e) => match self.on_failure {
                FailurePolicy::Drop => {
                    error!(batch = sequence, chunks = len, error = %e, "dropping batch");
                    self.progress.points_dropped(len);
                    Ok(BatchOutcome::Dropped(len))
                }
                FailurePolicy::Halt => {
                    error!(batch = sequence, chunks = len, error = %e, "batch failed, halting");
                    Err(PipelineError::BatchFailed {
                        batch: sequence,
                        source: e,
                    })
                }
            },
        }
    }

    /// Embed, number and upsert one batch.
    pub async fn process(&self, batch: Batch) -> Result<(), BatchError> {
        if batch.is_empty() {
            return Ok(());
        }

        let texts = batch.texts();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(BatchError::VectorCountMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }

        let ids = self.ids.reserve_range(texts.len() as u64);
        let points: Vec<Point> = texts
            .into_iter()
            .zip(vectors)
            .zip(batch.document_ids().iter().zip(batch.source_contents()))
            .zip(ids)
            .map(|(((text, vector), (document_id, source)), id)| Point {
                id: self.id_mapper.map(id),
                vector,
                payload: PointPayload {
                    text: if text.starts_with(&self.passage_prefix) {
                        text[self.passage_prefix.len()..].to_string()
                    } else {
                        text
                    },
                    document_id: document_id.clone(),
                    source_content: source.as_deref().map(str::to_string),
                },
            })
            .collect();

        with_retry(&self.upsert_retry, || self.store.upsert_points(points.clone()))
            .await?;
        Ok(())
    }
}
