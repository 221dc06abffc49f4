//! Throughput reporting for an ingestion run.
//!
//! Counters are updated by the producer (records, chunks) and by batch
//! workers (points), so they are plain atomics shared through an `Arc`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::info;

/// Where periodic progress lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutput {
    /// Plain lines on stdout, with a spinner on stderr when it is a terminal.
    Stdout,
    /// `tracing` events, keeping stdout free for machine-readable output.
    Log,
    Silent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub records: u64,
    pub chunks: u64,
    pub chars: u64,
    pub batches: u64,
    pub upserted: u64,
    pub dropped: u64,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn records_per_sec(&self) -> f64 {
        per_sec(self.records, self.elapsed)
    }

    pub fn chars_per_sec(&self) -> f64 {
        per_sec(self.chars, self.elapsed)
    }
}

fn per_sec(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records ({:.1}/s), {} chars ({:.0}/s), {} chunks, {} upserted, {} dropped, {:.1}s",
            self.records,
            self.records_per_sec(),
            self.chars,
            self.chars_per_sec(),
            self.chunks,
            self.upserted,
            self.dropped,
            self.elapsed.as_secs_f64()
        )
    }
}

pub struct ProgressReporter {
    started: Instant,
    every: u64,
    output: ProgressOutput,
    spinner: ProgressBar,
    records: AtomicU64,
    chunks: AtomicU64,
    chars: AtomicU64,
    batches: AtomicU64,
    upserted: AtomicU64,
    dropped: AtomicU64,
    lines: AtomicU64,
}

impl ProgressReporter {
    /// Report every `every` flushed batches; `0` only reports at the end.
    pub fn new(every: u64, output: ProgressOutput) -> Self {
        let spinner = if output == ProgressOutput::Stdout {
            let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
            {
                spinner.set_style(style);
            }
            spinner.enable_steady_tick(Duration::from_millis(200));
            spinner
        } else {
            ProgressBar::hidden()
        };

        Self {
            started: Instant::now(),
            every,
            output,
            spinner,
            records: AtomicU64::new(0),
            chunks: AtomicU64::new(0),
            chars: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            upserted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            lines: AtomicU64::new(0),
        }
    }

    pub fn silent() -> Self {
        Self::new(0, ProgressOutput::Silent)
    }

    pub fn record_document(&self, chars: usize, chunks: usize) {
        let records = self.records.fetch_add(1, Ordering::Relaxed) + 1;
        self.chars.fetch_add(chars as u64, Ordering::Relaxed);
        let chunks = self.chunks.fetch_add(chunks as u64, Ordering::Relaxed) + chunks as u64;
        self.spinner
            .set_message(format!("{records} records, {chunks} chunks"));
    }

    pub fn batch_flushed(&self) {
        let batches = self.batches.fetch_add(1, Ordering::Relaxed) + 1;
        if self.every > 0 && batches % self.every == 0 {
            self.emit(&self.snapshot());
        }
    }

    pub fn points_upserted(&self, n: usize) {
        self.upserted.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn points_dropped(&self, n: usize) {
        self.dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            records: self.records.load(Ordering::Relaxed),
            chunks: self.chunks.load(Ordering::Relaxed),
            chars: self.chars.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            upserted: self.upserted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }

    /// Number of progress lines emitted so far.
    pub fn lines_emitted(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    /// Emit the closing line and clear the spinner.
    pub fn finish(&self) -> ProgressSnapshot {
        let snapshot = self.snapshot();
        self.spinner.finish_and_clear();
        self.emit(&snapshot);
        snapshot
    }

    fn emit(&self, snapshot: &ProgressSnapshot) {
        self.lines.fetch_add(1, Ordering::Relaxed);
        match self.output {
            ProgressOutput::Stdout => self.spinner.suspend(|| println!("{snapshot}")),
            ProgressOutput::Log => info!(
                records = snapshot.records,
                chars = snapshot.chars,
                chunks = snapshot.chunks,
                upserted = snapshot.upserted,
                dropped = snapshot.dropped,
                records_per_sec = snapshot.records_per_sec(),
                "progress"
            ),
            ProgressOutput::Silent => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let progress = ProgressReporter::silent();
        progress.record_document(12, 1);
        progress.record_document(30, 3);
        progress.points_upserted(3);
        progress.points_dropped(1);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.records, 2);
        assert_eq!(snapshot.chars, 42);
        assert_eq!(snapshot.chunks, 4);
        assert_eq!(snapshot.upserted + snapshot.dropped, snapshot.chunks);
    }

    #[test]
    fn test_lines_every_n_batches() {
        let progress = ProgressReporter::new(2, ProgressOutput::Silent);
        for _ in 0..5 {
            progress.batch_flushed();
        }
        assert_eq!(progress.lines_emitted(), 2);
        progress.finish();
        assert_eq!(progress.lines_emitted(), 3);

        let quiet = ProgressReporter::new(0, ProgressOutput::Silent);
        quiet.batch_flushed();
        assert_eq!(quiet.lines_emitted(), 0);
    }

    #[test]
    fn test_rates() {
        let snapshot = ProgressSnapshot {
            records: 10,
            chars: 1000,
            elapsed: Duration::from_secs(2),
            ..Default::default()
        };
        assert_eq!(snapshot.records_per_sec(), 5.0);
        assert_eq!(snapshot.chars_per_sec(), 500.0);
        assert_eq!(ProgressSnapshot::default().records_per_sec(), 0.0);
        assert!(snapshot.to_string().starts_with("10 records (5.0/s), 1000 chars (500/s)"));
    }
}
