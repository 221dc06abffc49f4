//! End-to-end ingestion: files to documents to chunks to batches to points.
//!
//! A single producer reads, chunks and batches on a blocking thread while
//! the [`WorkerPool`] embeds and upserts. Stopping the producer still lets
//! dispatched batches drain; a halted pool stops it as well.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::batch::{BatchAccumulator, BatchProcessor};
use super::chunker::Chunker;
use super::embedding::EmbeddingService;
use super::ids::{IdAllocator, PointIdMapper};
use super::pool::{BatchSender, WorkerPool};
use super::progress::ProgressReporter;
use super::vector_store::VectorStore;
use crate::error::PipelineError;
use crate::models::{Config, Document, FilePolicy, IngestConfig, IngestReport};
use crate::sources::{DecodeBuffers, SourceOptions, open_records};
use crate::utils::retry::RetryConfig;

pub struct Pipeline {
    ingest: IngestConfig,
    chunker: Chunker,
    processor: Arc<BatchProcessor>,
    progress: Arc<ProgressReporter>,
    buffers: Arc<DecodeBuffers>,
    stop: CancellationToken,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingService>,
        store: Arc<dyn VectorStore>,
        progress: Arc<ProgressReporter>,
    ) -> Self {
        let ingest = config.ingest.clone();
        let processor = Arc::new(BatchProcessor {
            embedder,
            id_mapper: PointIdMapper::new(ingest.id_scheme, store.collection()),
            store,
            ids: Arc::new(IdAllocator::starting_at(ingest.start_id)),
            passage_prefix: chunker.passage_prefix().to_string(),
            upsert_retry: RetryConfig::new(config.embedding.max_retries),
            on_failure: ingest.on_embedding_failure,
            progress: progress.clone(),
        });

        Self {
            ingest,
            chunker,
            processor,
            progress,
            buffers: Arc::new(DecodeBuffers::default()),
            stop: CancellationToken::new(),
        }
    }

    /// Use `stop` instead of the pipeline's own stop token.
    pub fn with_stop_token(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    /// Cancel to stop reading input; dispatched batches still complete.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn buffers(&self) -> Arc<DecodeBuffers> {
        self.buffers.clone()
    }

    pub async fn run(self, files: Vec<PathBuf>) -> Result<IngestReport, PipelineError> {
        let started = Instant::now();
        let pool = WorkerPool::spawn(
            self.processor.clone(),
            self.ingest.parallelism,
            self.ingest.queue_depth,
        );

        let producer = Producer {
            accumulator: BatchAccumulator::new(self.ingest.batch_size),
            options: SourceOptions::from(&self.ingest),
            on_malformed_file: self.ingest.on_malformed_file,
            store_source_content: self.ingest.store_source_content,
            chunker: self.chunker,
            progress: self.progress.clone(),
            buffers: self.buffers.clone(),
            sender: pool.sender()?,
            stop: self.stop.clone(),
            halt: pool.halt_token(),
            report: IngestReport::default(),
        };

        info!(files = files.len(), "starting ingestion");
        let produced = tokio::task::spawn_blocking(move || producer.run(&files))
            .await
            .map_err(|e| PipelineError::TaskFailed(e.to_string()));

        let totals = pool.finish().await;
        self.progress.finish();
        // The pool error explains a producer that saw the queue close.
        let totals = totals?;
        let mut report = produced??;

        report.batches = totals.batches;
        report.batches_dropped = totals.batches_dropped;
        report.points_upserted = totals.points_upserted;
        report.points_dropped = totals.points_dropped;
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            documents = report.documents,
            chunks = report.chunks,
            upserted = report.points_upserted,
            dropped = report.points_dropped,
            "ingestion finished"
        );
        Ok(report)
    }
}

/// Sequential reader, chunker and batcher.
struct Producer {
    accumulator: BatchAccumulator,
    options: SourceOptions,
    on_malformed_file: FilePolicy,
    store_source_content: bool,
    chunker: Chunker,
    progress: Arc<ProgressReporter>,
    buffers: Arc<DecodeBuffers>,
    sender: BatchSender,
    stop: CancellationToken,
    halt: CancellationToken,
    report: IngestReport,
}

impl Producer {
    fn run(mut self, files: &[PathBuf]) -> Result<IngestReport, PipelineError> {
        for file in files {
            if self.should_stop() {
                break;
            }
            self.ingest_file(file)?;
        }

        if self.halt.is_cancelled() {
            return Ok(self.report);
        }
        if let Some(batch) = self.accumulator.finish() {
            self.progress.batch_flushed();
            self.sender.send_blocking(batch)?;
        }
        Ok(self.report)
    }

    fn should_stop(&mut self) -> bool {
        if self.halt.is_cancelled() {
            return true;
        }
        if self.stop.is_cancelled() {
            if !self.report.interrupted {
                warn!("stop requested, finishing dispatched batches");
            }
            self.report.interrupted = true;
            return true;
        }
        false
    }

    fn ingest_file(&mut self, file: &Path) -> Result<(), PipelineError> {
        let name = file.display().to_string();
        let records = match open_records(file, &self.options, self.buffers.clone()) {
            Ok(records) => records,
            Err(source) => {
                let err = PipelineError::OpenFile { file: name, source };
                return self.file_failed(err);
            }
        };

        info!(file = %name, "reading");
        for record in records {
            if self.should_stop() {
                return Ok(());
            }
            match record {
                Ok(document) => self.ingest_document(document)?,
                Err(source) => {
                    let err = PipelineError::MalformedFile { file: name, source };
                    return self.file_failed(err);
                }
            }
        }

        self.report.files_processed += 1;
        Ok(())
    }

    fn file_failed(&mut self, err: PipelineError) -> Result<(), PipelineError> {
        match self.on_malformed_file {
            FilePolicy::Abort => Err(err),
            FilePolicy::Skip => {
                error!(error = %err, "skipping rest of file");
                self.report.files_failed += 1;
                Ok(())
            }
        }
    }

    fn ingest_document(&mut self, document: Document) -> Result<(), PipelineError> {
        let outcome = match self.chunker.chunk(&document) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(document_id = %document.id, error = %e, "skipping document");
                self.report.documents_skipped += 1;
                return Ok(());
            }
        };

        let chars = document.char_len();
        let chunks = outcome.chunks.len();
        self.report.documents += 1;
        self.report.chars += chars as u64;
        self.report.chunks += chunks as u64;
        self.report.oversize_chunks += outcome.oversize as u64;
        self.progress.record_document(chars, chunks);

        let source = self
            .store_source_content
            .then(|| Arc::from(document.source_content()));
        if let Some(batch) = self.accumulator.push_document(outcome.chunks, source) {
            self.progress.batch_flushed();
            self.sender.send_blocking(batch)?;
        }
        Ok(())
    }
}
