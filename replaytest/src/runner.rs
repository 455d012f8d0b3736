//! Run modes: the shared bulk-load phase, the unpaced insert mode, and the
//! paced transaction mode sweeping a list of arrival rates.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::Instant;
use triplestore::{SharedStore, Statement};

use crate::config::Config;
use crate::dispatch::{EngineConfig, run_chunk};
use crate::report::{self, ChunkStats, Recorder};
use crate::txlog::TransactionLog;
use crate::workload::{ArrivalSampler, build_schedule};

/// Loads the bulk statement set in a single store transaction.
pub async fn bulk_load(store: &SharedStore, statements: Vec<Statement>) -> Result<()> {
    let started = Instant::now();
    let count = statements.len();

    let mut txn = store.begin().await?;
    for statement in &statements {
        txn.add_statement(&statement.subject, &statement.predicate, &statement.object)
            .await?;
    }
    txn.commit().await.context("bulk load failed")?;

    report::print_bulk_load(started.elapsed(), count);
    Ok(())
}

/// Insert mode: bulk-load, then apply the whole replay workload in one
/// store transaction with no pacing, to measure raw ingestion throughput.
pub async fn run_insert(store: SharedStore, log: TransactionLog) -> Result<()> {
    bulk_load(&store, log.bulk).await?;

    let started = Instant::now();
    let mut writes = 0;

    let mut txn = store.begin().await?;
    for record in &log.replay {
        for predicate in &record.predicates {
            txn.add_statement(&record.subject, predicate, &record.object)
                .await?;
            writes += 1;
        }
    }
    txn.commit().await.context("incremental load failed")?;

    report::print_insert(started.elapsed(), log.replay.len(), writes);
    Ok(())
}

/// Transaction mode: bulk-load, then replay the workload in chunks, one
/// arrival-rate parameter per chunk, recording each chunk's measurements.
///
/// The sweep stops when the replay workload is exhausted, even if rate
/// steps remain.
pub async fn run_transactions(
    store: SharedStore,
    log: TransactionLog,
    config: &Config,
    output: &Path,
) -> Result<()> {
    bulk_load(&store, log.bulk).await?;

    let mut recorder = Recorder::create(output)?;
    let engine = EngineConfig::from(config);
    let mut sampler = ArrivalSampler::new(config.seed);

    let mut replay = log.replay;
    let mut first_id = 0;
    for &lambda_ms in &config.lambda_steps_ms {
        if replay.is_empty() {
            break;
        }
        let take = config.chunk_size.min(replay.len());
        let records: Vec<_> = replay.drain(..take).collect();
        let schedule = build_schedule(
            records,
            first_id,
            lambda_ms,
            config.service_delay_mean_ms,
            &mut sampler,
        );
        first_id += take;

        tracing::info!(lambda_ms, transactions = take, "starting chunk");
        let outcome = run_chunk(Arc::clone(&store), &engine, schedule).await;

        let stats = ChunkStats::collect(lambda_ms, &outcome);
        stats.print_summary(outcome.peak_workers);
        recorder
            .record_chunk(&stats, &outcome)
            .context("writing output record")?;
    }

    Ok(())
}
