//! Worker pool lifecycle and the worker task body.
//!
//! [`WorkerPool`] tracks how many workers are registered and how many are
//! currently holding a dequeued transaction. Workers self-register on
//! start and deregister on exit; the dispatcher watches the counters to
//! prime the run, grow the pool, and wait for the final drain. All counter
//! updates signal the pool's `changed` notifier so waiters re-check their
//! predicate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tokio::time::Instant;
use triplestore::{SharedStore, StoreResult};

use crate::queue::TxQueue;
use crate::workload::{Completion, Transaction};

#[derive(Debug, Default)]
struct Counters {
    active: usize,
    busy: usize,
    peak_active: usize,
}

/// Shared state of the elastic worker pool for one chunk.
#[derive(Debug, Default)]
pub struct WorkerPool {
    counters: Mutex<Counters>,
    /// Workers currently inside their simulated service hold. Diagnostic
    /// only, never part of a control decision.
    sleeping: AtomicUsize,
    /// Monotonic: transitions false to true once, never resets.
    shutting_down: AtomicBool,
    /// Wall-clock reference point for response times, set once per chunk
    /// after the first worker has registered.
    time_base: OnceLock<Instant>,
    /// Signaled on every registration, deregistration, busy transition,
    /// or shutdown. Predicate is whatever the waiter re-checks.
    changed: Notify,
}

impl WorkerPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called by a worker before it starts pulling transactions.
    pub fn register(&self) {
        let mut counters = self.counters.lock().unwrap();
        counters.active += 1;
        counters.peak_active = counters.peak_active.max(counters.active);
        drop(counters);
        self.changed.notify_waiters();
    }

    /// Called by a worker as the last thing before it exits.
    pub fn deregister(&self) {
        self.counters.lock().unwrap().active -= 1;
        self.changed.notify_waiters();
    }

    /// Marks a worker as holding a dequeued transaction.
    pub fn begin_work(&self) {
        self.counters.lock().unwrap().busy += 1;
        self.changed.notify_waiters();
    }

    /// Marks a worker as idle again.
    pub fn finish_work(&self) {
        self.counters.lock().unwrap().busy -= 1;
        self.changed.notify_waiters();
    }

    /// Returns the current (active, busy) worker counts.
    pub fn counts(&self) -> (usize, usize) {
        let counters = self.counters.lock().unwrap();
        (counters.active, counters.busy)
    }

    /// Returns the number of currently registered workers.
    pub fn active(&self) -> usize {
        self.counters.lock().unwrap().active
    }

    /// Returns the highest number of simultaneously registered workers.
    pub fn peak_active(&self) -> usize {
        self.counters.lock().unwrap().peak_active
    }

    /// Returns the number of workers inside their service hold.
    pub fn sleeping(&self) -> usize {
        self.sleeping.load(Ordering::Relaxed)
    }

    /// Requests shutdown. Workers finish their in-flight transaction,
    /// observe the empty queue, and exit.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    /// Returns whether shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Sets the batch time base. Later calls are ignored.
    pub fn set_time_base(&self, base: Instant) {
        let _ = self.time_base.set(base);
    }

    /// Milliseconds elapsed since the batch time base.
    pub fn elapsed_ms(&self) -> u64 {
        self.time_base
            .get()
            .map(|base| base.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// A wakeup that fires when pool occupancy may have changed.
    pub fn changed_signal(&self) -> Notified<'_> {
        self.changed.notified()
    }

    /// Waits until at least one worker has registered.
    pub async fn wait_first_registered(&self) {
        loop {
            let changed = self.changed_signal();
            if self.active() > 0 {
                return;
            }
            changed.await;
        }
    }

    /// Waits until every worker has deregistered.
    ///
    /// Re-polls on `poll_interval` so a wakeup racing the wait cannot
    /// leave the caller parked forever.
    pub async fn wait_drained(&self, poll_interval: Duration) {
        loop {
            let changed = self.changed_signal();
            if self.active() == 0 {
                return;
            }
            let _ = tokio::time::timeout(poll_interval, changed).await;
        }
    }
}

/// Everything a worker task needs, cloned per spawn.
#[derive(Clone, Debug)]
pub(crate) struct WorkerContext {
    pub store: SharedStore,
    pub queue: Arc<TxQueue>,
    pub pool: Arc<WorkerPool>,
    pub completions: Arc<Mutex<Vec<Completion>>>,
}

/// The worker task body: register, drain the queue, deregister.
pub(crate) async fn run_worker(ctx: WorkerContext) {
    ctx.pool.register();

    loop {
        let wakeup = ctx.queue.non_empty_signal();
        let Some(transaction) = ctx.queue.try_pop() else {
            if ctx.pool.is_shutting_down() {
                break;
            }
            wakeup.await;
            continue;
        };

        ctx.pool.begin_work();
        let completion = match execute(&ctx, &transaction).await {
            Ok(writes) => Completion {
                id: transaction.id,
                writes,
                response_ms: Some(
                    ctx.pool
                        .elapsed_ms()
                        .saturating_sub(transaction.arrival_ms),
                ),
            },
            Err(error) => {
                tracing::error!(id = transaction.id, %error, "transaction failed, skipping");
                Completion {
                    id: transaction.id,
                    writes: 0,
                    response_ms: None,
                }
            }
        };
        ctx.completions.lock().unwrap().push(completion);
        ctx.pool.finish_work();
    }

    ctx.pool.deregister();
}

/// Executes one transaction against the store: read the object pattern,
/// hold for the simulated service time, apply the predicate writes.
async fn execute(ctx: &WorkerContext, transaction: &Transaction) -> StoreResult<usize> {
    let mut txn = ctx.store.begin().await?;
    txn.query_by_object(&transaction.object).await?;

    ctx.pool.sleeping.fetch_add(1, Ordering::Relaxed);
    tokio::time::sleep(Duration::from_millis(transaction.service_delay_ms)).await;
    ctx.pool.sleeping.fetch_sub(1, Ordering::Relaxed);

    for predicate in &transaction.predicates {
        txn.add_statement(&transaction.subject, predicate, &transaction.object)
            .await?;
    }
    txn.commit().await?;

    Ok(transaction.predicates.len())
}
