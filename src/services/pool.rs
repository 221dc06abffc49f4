//! Fixed-size worker pool fed through a bounded queue.
//!
//! The producer blocks on enqueue while every worker is busy and the queue
//! is full, which caps memory and outbound request concurrency. Batches may
//! complete in any order.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::batch::{BatchOutcome, BatchProcessor};
use crate::error::PipelineError;
use crate::models::Batch;

/// Per-run totals gathered from the workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTotals {
    pub batches: u64,
    pub batches_dropped: u64,
    pub points_upserted: u64,
    pub points_dropped: u64,
}

impl PoolTotals {
    fn add(&mut self, outcome: BatchOutcome) {
        self.batches += 1;
        match outcome {
            BatchOutcome::Upserted(n) => self.points_upserted += n as u64,
            BatchOutcome::Dropped(n) => {
                self.batches_dropped += 1;
                self.points_dropped += n as u64;
            }
        }
    }

    fn merge(&mut self, other: PoolTotals) {
        self.batches += other.batches;
        self.batches_dropped += other.batches_dropped;
        self.points_upserted += other.points_upserted;
        self.points_dropped += other.points_dropped;
    }
}

/// Handle used by the producer to hand batches to the pool.
#[derive(Clone)]
pub struct BatchSender {
    tx: mpsc::Sender<Batch>,
}

impl BatchSender {
    pub async fn send(&self, batch: Batch) -> Result<(), PipelineError> {
        self.tx
            .send(batch)
            .await
            .map_err(|_| PipelineError::PoolClosed)
    }

    /// Blocking variant for a producer on a blocking thread.
    /// Must not be called from within an async context.
    pub fn send_blocking(&self, batch: Batch) -> Result<(), PipelineError> {
        self.tx
            .blocking_send(batch)
            .map_err(|_| PipelineError::PoolClosed)
    }
}

pub struct WorkerPool {
    tx: Option<mpsc::Sender<Batch>>,
    workers: JoinSet<Result<PoolTotals, PipelineError>>,
    halt: CancellationToken,
}

impl WorkerPool {
    /// Start `parallelism` workers behind a queue of `queue_depth` batches.
    pub fn spawn(processor: Arc<BatchProcessor>, parallelism: usize, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let halt = CancellationToken::new();

        let mut workers = JoinSet::new();
        for worker in 0..parallelism.max(1) {
            workers.spawn(run_worker(
                worker,
                processor.clone(),
                rx.clone(),
                halt.clone(),
            ));
        }

        Self {
            tx: Some(tx),
            workers,
            halt,
        }
    }

    pub fn sender(&self) -> Result<BatchSender, PipelineError> {
        self.tx
            .clone()
            .map(|tx| BatchSender { tx })
            .ok_or(PipelineError::PoolClosed)
    }

    /// Cancelled once a worker fails fatally.
    pub fn halt_token(&self) -> CancellationToken {
        self.halt.clone()
    }

    pub async fn submit(&self, batch: Batch) -> Result<(), PipelineError> {
        self.sender()?.send(batch).await
    }

    /// Close the queue, wait for every worker and combine their totals.
    ///
    /// Returns the first fatal error if any worker halted. Senders handed out
    /// by [`Self::sender`] must be dropped first or this waits forever.
    pub async fn finish(mut self) -> Result<PoolTotals, PipelineError> {
        self.tx.take();

        let mut totals = PoolTotals::default();
        let mut first_error = None;
        while let Some(joined) = self.workers.join_next().await {
            let result = joined.map_err(|e| PipelineError::TaskFailed(e.to_string()));
            match result.and_then(|r| r) {
                Ok(worker_totals) => totals.merge(worker_totals),
                Err(e) => {
                    self.halt.cancel();
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(totals),
        }
    }
}

async fn run_worker(
    worker: usize,
    processor: Arc<BatchProcessor>,
    rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
    halt: CancellationToken,
) -> Result<PoolTotals, PipelineError> {
    let mut totals = PoolTotals::default();
    loop {
        let batch = {
            let mut rx = rx.lock().await;
            tokio::select! {
                biased;
                _ = halt.cancelled() => None,
                batch = rx.recv() => batch,
            }
        };
        let Some(batch) = batch else {
            break;
        };

        match processor.run(batch).await {
            Ok(outcome) => totals.add(outcome),
            Err(e) => {
                halt.cancel();
                return Err(e);
            }
        }
    }
    debug!(worker, batches = totals.batches, "worker finished");
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, FailurePolicy};
    use crate::services::batch::BatchAccumulator;
    use crate::services::ids::{IdAllocator, PointIdMapper};
    use crate::services::progress::ProgressReporter;
    use crate::services::testing::{MemoryStore, MockEmbedder};
    use crate::utils::retry::RetryConfig;
    use std::collections::HashSet;
    use std::time::Duration;

    fn processor(
        embedder: Arc<MockEmbedder>,
        store: Arc<MemoryStore>,
        on_failure: FailurePolicy,
    ) -> Arc<BatchProcessor> {
        Arc::new(BatchProcessor {
            embedder,
            store,
            ids: Arc::new(IdAllocator::default()),
            id_mapper: PointIdMapper::Sequential,
            passage_prefix: String::new(),
            upsert_retry: RetryConfig::new(1),
            on_failure,
            progress: Arc::new(ProgressReporter::silent()),
        })
    }

    fn batches(count: usize, size: usize, fail_every: Option<usize>) -> Vec<Batch> {
        let mut acc = BatchAccumulator::new(size);
        let mut out = Vec::new();
        for b in 0..count {
            let chunks = (0..size)
                .map(|i| {
                    let fail = fail_every.is_some_and(|n| b % n == 0) && i == 0;
                    Chunk {
                        document_id: format!("doc{b}"),
                        header_prefix: String::new(),
                        text: if fail {
                            MockEmbedder::FAIL_MARKER.to_string()
                        } else {
                            format!("text {b}-{i}")
                        },
                        token_count: 2,
                    }
                })
                .collect();
            out.extend(acc.push_document(chunks, None));
        }
        out
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bounded_concurrency_and_distinct_ids() {
        for parallelism in [1, 4] {
            let embedder = Arc::new(MockEmbedder::new(2).with_delay(Duration::from_millis(5)));
            let store = Arc::new(MemoryStore::default());
            let pool = WorkerPool::spawn(
                processor(embedder.clone(), store.clone(), FailurePolicy::Drop),
                parallelism,
                1,
            );

            for batch in batches(20, 5, None) {
                pool.submit(batch).await.unwrap();
            }
            let totals = pool.finish().await.unwrap();

            assert_eq!(totals.batches, 20);
            assert_eq!(totals.points_upserted, 100);
            assert!(embedder.max_in_flight() <= parallelism);

            let ids: HashSet<String> = store.points().iter().map(|p| p.id.to_string()).collect();
            assert_eq!(ids.len(), 100);
        }
    }

    #[tokio::test]
    async fn test_dropped_batches_are_counted() {
        let embedder = Arc::new(MockEmbedder::new(2));
        let store = Arc::new(MemoryStore::default());
        let pool = WorkerPool::spawn(
            processor(embedder, store.clone(), FailurePolicy::Drop),
            3,
            2,
        );

        for batch in batches(9, 4, Some(3)) {
            pool.submit(batch).await.unwrap();
        }
        let totals = pool.finish().await.unwrap();

        assert_eq!(totals.batches_dropped, 3);
        assert_eq!(totals.points_dropped, 12);
        assert_eq!(totals.points_upserted, 24);
        assert_eq!(totals.points_upserted + totals.points_dropped, 36);
        assert_eq!(store.points().len(), 24);
    }

    #[tokio::test]
    async fn test_halt_stops_workers_and_reports_error() {
        let embedder = Arc::new(MockEmbedder::new(2));
        let store = Arc::new(MemoryStore::default());
        let pool = WorkerPool::spawn(
            processor(embedder, store, FailurePolicy::Halt),
            2,
            1,
        );
        let halt = pool.halt_token();

        let mut submitted = 0;
        for batch in batches(10, 2, Some(1)) {
            if pool.submit(batch).await.is_err() {
                break;
            }
            submitted += 1;
        }
        assert!(submitted >= 1);

        let err = pool.finish().await.unwrap_err();
        assert!(matches!(err, PipelineError::BatchFailed { .. }));
        assert!(halt.is_cancelled());
    }
}
