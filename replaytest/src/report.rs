//! Chunk metrics and the run's output record.
//!
//! After each chunk drains, the recorder appends two lines to the output
//! file: a summary line `<lambda> <elapsedMs> <transactionCount>
//! <totalWrites>` and a raw line of per-transaction response times in
//! completion order (failed transactions appear as `-1`). Throughput
//! figures are derived for the console summary, never stored.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::dispatch::ChunkOutcome;

/// Aggregated statistics for one drained chunk.
pub struct ChunkStats {
    /// Mean interarrival time of the chunk, in milliseconds.
    pub lambda_ms: u64,
    /// Transactions executed (including failed ones).
    pub transactions: usize,
    /// Transactions whose store interaction failed.
    pub failures: usize,
    /// Statements committed across the chunk.
    pub writes: usize,
    /// Wall-clock chunk duration.
    pub elapsed: Duration,
    /// Response-time distribution of the successful transactions, in ms.
    pub response_times: DDSketch,
}

impl std::fmt::Debug for ChunkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStats")
            .field("lambda_ms", &self.lambda_ms)
            .field("transactions", &self.transactions)
            .field("failures", &self.failures)
            .field("writes", &self.writes)
            .field("elapsed", &self.elapsed)
            .field("response_times", &format_args!("DDSketch(count={})", self.response_times.count()))
            .finish()
    }
}

impl ChunkStats {
    /// Folds a chunk outcome into summary statistics.
    pub fn collect(lambda_ms: u64, outcome: &ChunkOutcome) -> Self {
        let mut response_times = DDSketch::default();
        let mut failures = 0;
        let mut writes = 0;
        for completion in &outcome.completions {
            match completion.response_ms {
                Some(ms) => response_times.add(ms as f64),
                None => failures += 1,
            }
            writes += completion.writes;
        }

        Self {
            lambda_ms,
            transactions: outcome.completions.len(),
            failures,
            writes,
            elapsed: outcome.elapsed,
            response_times,
        }
    }

    /// Prints the chunk summary to the console.
    pub fn print_summary(&self, peak_workers: usize) {
        println!();
        println!(
            "{} {} ({} transactions, {} workers)",
            "## Chunk".bold(),
            format!("lambda={}ms", self.lambda_ms).bold().blue(),
            self.transactions.bold(),
            peak_workers.bold()
        );

        let secs = self.elapsed.as_secs_f64();
        println!(
            "  {:.2?} elapsed; {:.2} transactions/s; {:.2} writes/s",
            self.elapsed,
            (self.transactions as f64 / secs).bold(),
            self.writes as f64 / secs
        );
        print_percentiles(&self.response_times);

        if self.failures > 0 {
            println!("  {}", format!("{} FAILURES", self.failures).bold().red());
        }
    }
}

fn print_percentiles(sketch: &DDSketch) {
    let count = sketch.count();
    if count == 0 {
        return;
    }
    let avg = millis(sketch.sum().unwrap() / count as f64);
    let p50 = millis(sketch.quantile(0.5).unwrap().unwrap());
    let p90 = millis(sketch.quantile(0.9).unwrap().unwrap());
    let p99 = millis(sketch.quantile(0.99).unwrap().unwrap());
    println!(
        "  response avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}

fn millis(value: f64) -> Duration {
    Duration::from_secs_f64(value / 1000.0)
}

/// Prints the bulk-load timing.
pub fn print_bulk_load(elapsed: Duration, triples: usize) {
    println!(
        "{} ({} triples)",
        "## Bulk load".bold(),
        triples.bold().blue()
    );
    println!(
        "  {:.2?} elapsed; {:.2} triples/s",
        elapsed,
        (triples as f64 / elapsed.as_secs_f64()).bold()
    );
}

/// Prints the unpaced insert-mode timing.
pub fn print_insert(elapsed: Duration, transactions: usize, triples: usize) {
    println!(
        "{} ({} transactions, {} triples)",
        "## Incremental load".bold(),
        transactions.bold().blue(),
        triples.bold()
    );
    println!(
        "  {:.2?} elapsed; {:.2} transactions/s; {:.2} triples/s",
        elapsed,
        (transactions as f64 / elapsed.as_secs_f64()).bold(),
        triples as f64 / elapsed.as_secs_f64()
    );
}

/// Writes the run's output record, one summary and one raw line per chunk.
#[derive(Debug)]
pub struct Recorder {
    out: BufWriter<File>,
}

impl Recorder {
    /// Creates (truncating) the output record at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create output record {}", path.display()))?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Appends one chunk to the record and flushes it.
    pub fn record_chunk(&mut self, stats: &ChunkStats, outcome: &ChunkOutcome) -> Result<()> {
        writeln!(
            self.out,
            "{} {} {} {}",
            stats.lambda_ms,
            stats.elapsed.as_millis(),
            stats.transactions,
            stats.writes
        )?;

        let mut separator = "";
        for completion in &outcome.completions {
            match completion.response_ms {
                Some(ms) => write!(self.out, "{separator}{ms}")?,
                None => write!(self.out, "{separator}-1")?,
            }
            separator = " ";
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}
