//! End-to-end scenarios for the dispatch engine and the run modes.
//!
//! All timing-sensitive tests run on tokio's paused clock, so the virtual
//! schedule is deterministic and the tests finish in real milliseconds.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use replaytest::config::Config;
use replaytest::dispatch::{EngineConfig, run_chunk};
use replaytest::workload::Transaction;
use replaytest::{runner, txlog};
use triplestore::{
    MemoryStore, SharedStore, Statement, Store, StoreError, StoreResult, StoreTransaction,
};

fn engine(queue_capacity: usize, initial_workers: usize, max_workers: usize) -> EngineConfig {
    EngineConfig {
        queue_capacity,
        initial_workers,
        max_workers,
        snapshot_interval: Duration::from_secs(10),
        drain_poll_interval: Duration::from_millis(100),
    }
}

fn transaction(id: usize, arrival_ms: u64, service_delay_ms: u64) -> Transaction {
    Transaction {
        id,
        arrival_ms,
        service_delay_ms,
        subject: format!("subject-{id}"),
        object: format!("object-{id}"),
        predicates: vec!["tagged".to_owned()],
    }
}

#[tokio::test(start_paused = true)]
async fn single_worker_completes_in_arrival_order() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let transactions = vec![
        transaction(0, 0, 50),
        transaction(1, 100, 50),
        transaction(2, 200, 50),
    ];

    let outcome = run_chunk(store, &engine(16, 1, 1), transactions).await;

    let order: Vec<_> = outcome.completions.iter().map(|c| c.id).collect();
    assert_eq!(order, vec![0, 1, 2]);

    // The dispatcher is not the bottleneck here, so each response time is
    // dominated by the service delay.
    for completion in &outcome.completions {
        let response = completion.response_ms.unwrap();
        assert!(response >= 50, "response {response} below service delay");
        assert!(response <= 60, "response {response} includes queueing");
    }
}

#[tokio::test(start_paused = true)]
async fn every_transaction_is_delivered_exactly_once() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let transactions: Vec<_> = (0..200).map(|id| transaction(id, 0, 1)).collect();

    // A queue far smaller than the workload, so backpressure is exercised.
    let outcome = run_chunk(store, &engine(8, 3, 6), transactions).await;

    assert_eq!(outcome.completions.len(), 200);
    let ids: HashSet<_> = outcome.completions.iter().map(|c| c.id).collect();
    assert_eq!(ids.len(), 200, "duplicate or lost transactions");
    assert!(outcome.peak_workers <= 6);
}

#[tokio::test(start_paused = true)]
async fn saturation_grows_the_pool_to_the_cap() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let transactions: Vec<_> = (0..100).map(|id| transaction(id, 0, 20)).collect();

    let outcome = run_chunk(store, &engine(8, 1, 4), transactions).await;

    assert_eq!(outcome.completions.len(), 100);
    assert_eq!(outcome.peak_workers, 4, "pool should grow to the cap");
}

#[tokio::test(start_paused = true)]
async fn response_time_covers_the_service_delay() {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let outcome = run_chunk(store, &engine(4, 1, 1), vec![transaction(0, 0, 250)]).await;

    let response = outcome.completions[0].response_ms.unwrap();
    assert!(response >= 250);
}

#[tokio::test(start_paused = true)]
async fn committed_writes_reach_the_store() {
    let memory = MemoryStore::new();
    let store: SharedStore = Arc::new(memory.clone());

    let mut transactions = vec![transaction(0, 0, 10)];
    transactions[0].predicates = vec!["a".to_owned(), "b".to_owned()];

    let outcome = run_chunk(store, &engine(4, 1, 1), transactions).await;

    assert_eq!(outcome.completions[0].writes, 2);
    assert_eq!(memory.statement_count(), 2);
    assert_eq!(memory.statements_with_object("object-0").len(), 2);
}

/// A store whose commits fail on a fixed cadence, for exercising the
/// per-transaction failure containment.
#[derive(Debug)]
struct FlakyStore {
    inner: MemoryStore,
    begun: AtomicUsize,
}

#[async_trait::async_trait]
impl Store for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let sequence = self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FlakyTransaction {
            inner: self.inner.begin().await?,
            fail_commit: sequence % 4 == 3,
        }))
    }
}

struct FlakyTransaction {
    inner: Box<dyn StoreTransaction>,
    fail_commit: bool,
}

#[async_trait::async_trait]
impl StoreTransaction for FlakyTransaction {
    async fn query_by_object(&mut self, object: &str) -> StoreResult<Vec<Statement>> {
        self.inner.query_by_object(object).await
    }

    async fn add_statement(
        &mut self,
        subject: &str,
        predicate: &str,
        object: &str,
    ) -> StoreResult<()> {
        self.inner.add_statement(subject, predicate, object).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.fail_commit {
            return Err(StoreError::backend(
                "commit",
                std::io::Error::other("injected commit failure"),
            ));
        }
        self.inner.commit().await
    }
}

#[tokio::test(start_paused = true)]
async fn store_failures_are_contained_per_transaction() {
    let store: SharedStore = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        begun: AtomicUsize::new(0),
    });
    let transactions: Vec<_> = (0..40).map(|id| transaction(id, 0, 5)).collect();

    let outcome = run_chunk(store, &engine(8, 2, 4), transactions).await;

    // Every transaction completes exactly once; the failed ones carry no
    // response time but the run keeps going and the pool drains.
    assert_eq!(outcome.completions.len(), 40);
    let failures = outcome
        .completions
        .iter()
        .filter(|c| c.response_ms.is_none())
        .count();
    assert_eq!(failures, 10);
}

const PIPELINE_LOG: &str = "\
0
4
1
s s0
o o0
p p0
1
s s1
o o1
p p1
1
s s2
o o2
p p2
1
s s3
o o3
p p3
";

#[tokio::test(start_paused = true)]
async fn transaction_mode_pipeline_end_to_end() {
    let memory = MemoryStore::new();
    let store: SharedStore = Arc::new(memory.clone());

    let log = txlog::parse(PIPELINE_LOG.as_bytes()).unwrap();
    assert_eq!(log.bulk.len(), 2);
    assert_eq!(log.replay.len(), 2);

    let config = Config {
        lambda_steps_ms: vec![0],
        service_delay_mean_ms: 10,
        initial_workers: 2,
        max_workers: 4,
        ..Config::default()
    };

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("results");
    runner::run_transactions(store, log, &config, &output)
        .await
        .unwrap();

    // Bulk load folded 2 statements, the replay phase committed 2 more.
    assert_eq!(memory.statement_count(), 4);

    let contents = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 2, "one summary and one raw line");

    let summary: Vec<_> = lines[0].split(' ').collect();
    assert_eq!(summary[0], "0", "lambda column");
    assert_eq!(summary[2], "2", "transaction count column");
    assert_eq!(summary[3], "2", "write count column");

    assert_eq!(lines[1].split(' ').count(), 2, "one response per transaction");
}

#[tokio::test]
async fn insert_mode_applies_the_whole_workload() {
    let memory = MemoryStore::new();
    let store: SharedStore = Arc::new(memory.clone());

    let log = txlog::parse(PIPELINE_LOG.as_bytes()).unwrap();
    runner::run_insert(store, log).await.unwrap();

    assert_eq!(memory.statement_count(), 4);
}
