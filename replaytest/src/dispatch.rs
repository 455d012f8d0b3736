//! The arrival-paced dispatch engine.
//!
//! One dispatcher task per chunk feeds the transaction queue according to
//! the precomputed arrival schedule, grows the worker pool when every
//! worker is simultaneously busy, and pauses injection while the queue is
//! full; queue-full is the backpressure signal, not an error. Once the
//! whole chunk has been handed over it initiates shutdown and waits for
//! the pool to drain before finalizing the chunk's measurements.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use triplestore::SharedStore;

use crate::config::Config;
use crate::pool::{WorkerContext, WorkerPool, run_worker};
use crate::queue::TxQueue;
use crate::workload::{Completion, Transaction};

/// Dispatch engine knobs, shared by every chunk of a run.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Number of transactions the queue can hold.
    pub queue_capacity: usize,
    /// Size of the worker cohort spawned at chunk start. Must be at least 1.
    pub initial_workers: usize,
    /// Hard cap on pool growth.
    pub max_workers: usize,
    /// Cadence of diagnostic snapshots.
    pub snapshot_interval: Duration,
    /// Re-check interval for the drain wait.
    pub drain_poll_interval: Duration,
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            initial_workers: config.initial_workers,
            max_workers: config.max_workers,
            snapshot_interval: config.snapshot_interval,
            drain_poll_interval: config.drain_poll_interval,
        }
    }
}

/// Everything a drained chunk hands to the metrics recorder.
#[derive(Debug)]
pub struct ChunkOutcome {
    /// Wall-clock time from worker spawn to full drain.
    pub elapsed: Duration,
    /// One record per transaction, in completion order.
    pub completions: Vec<Completion>,
    /// Highest number of simultaneously registered workers.
    pub peak_workers: usize,
}

/// Replays one chunk of scheduled transactions and drains the pool.
pub async fn run_chunk(
    store: SharedStore,
    engine: &EngineConfig,
    transactions: Vec<Transaction>,
) -> ChunkOutcome {
    assert!(engine.initial_workers >= 1, "need at least one worker");
    let started = Instant::now();

    let queue = Arc::new(TxQueue::new(engine.queue_capacity));
    let pool = Arc::new(WorkerPool::new());
    let completions = Arc::new(Mutex::new(Vec::with_capacity(transactions.len())));

    let ctx = WorkerContext {
        store,
        queue: Arc::clone(&queue),
        pool: Arc::clone(&pool),
        completions: Arc::clone(&completions),
    };

    let mut handles: Vec<JoinHandle<()>> = Vec::new();
    for _ in 0..engine.initial_workers {
        handles.push(tokio::spawn(run_worker(ctx.clone())));
    }

    // Prime: the response-time clock starts only once the pool is alive.
    pool.wait_first_registered().await;
    pool.set_time_base(Instant::now());

    let mut pending: VecDeque<Transaction> = transactions.into();
    let mut last_scaled_ms: Option<u64> = None;
    let mut last_snapshot_ms = 0u64;
    let snapshot_ms = engine.snapshot_interval.as_millis() as u64;

    while !pending.is_empty() {
        // Register wakeups before reading shared state so nothing that
        // changes between check and wait is lost.
        let space = queue.non_full_signal();
        let occupancy = pool.changed_signal();

        let now_ms = pool.elapsed_ms();

        // Feed: hand over every transaction that is due while there is
        // room. May enqueue zero, one, or many per wakeup.
        while pending
            .front()
            .is_some_and(|next| next.arrival_ms <= now_ms)
        {
            let Some(transaction) = pending.pop_front() else {
                break;
            };
            if let Err(transaction) = queue.try_push(transaction) {
                pending.push_front(transaction);
                break;
            }
        }
        let Some(next_arrival_ms) = pending.front().map(|next| next.arrival_ms) else {
            break;
        };

        // Scale: every worker occupied means the pool is under-provisioned
        // for the current rate. At most one spawn per millisecond timestamp.
        let (active, busy) = pool.counts();
        if active == busy
            && active < engine.max_workers
            && last_scaled_ms.is_none_or(|last| now_ms > last)
        {
            handles.push(tokio::spawn(run_worker(ctx.clone())));
            last_scaled_ms = Some(now_ms);
            tracing::debug!(workers = active + 1, at_ms = now_ms, "growing worker pool");
        }

        if now_ms >= last_snapshot_ms + snapshot_ms {
            let (read, write) = queue.indices();
            tracing::info!(
                read,
                write,
                queued = queue.len(),
                active,
                busy,
                sleeping = pool.sleeping(),
                "dispatch snapshot"
            );
            last_snapshot_ms = now_ms;
        }

        // Pace: sleep until the next transaction is due, or until a worker
        // frees a slot or changes pool occupancy, whichever comes first.
        if next_arrival_ms > now_ms {
            tokio::select! {
                _ = space => {}
                _ = occupancy => {}
                _ = tokio::time::sleep(Duration::from_millis(next_arrival_ms - now_ms)) => {}
            }
        } else {
            tokio::select! {
                _ = space => {}
                _ = occupancy => {}
            }
        }
    }

    // Drain: the whole chunk is handed over. Wake idle workers so they
    // observe the shutdown flag, then wait for full deregistration.
    pool.begin_shutdown();
    queue.wake_consumers();
    pool.wait_drained(engine.drain_poll_interval).await;

    for result in join_all(handles).await {
        if let Err(error) = result {
            tracing::error!(%error, "worker task terminated abnormally");
        }
    }

    let completions = std::mem::take(&mut *completions.lock().unwrap());
    ChunkOutcome {
        elapsed: started.elapsed(),
        completions,
        peak_workers: pool.peak_active(),
    }
}
