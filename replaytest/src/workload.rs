//! Workload preparation: transaction descriptors and the exponential
//! arrival/service-delay schedule.
//!
//! All draws for a run come from a single seeded [`SmallRng`] stream, so a
//! given seed and transaction log always produce the same schedule.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Distribution, Exp};

use crate::txlog::TxRecord;

/// One unit of injected work.
///
/// Owned by whichever component currently holds it: the dispatcher's
/// pending list, the queue, or the executing worker. Hand-off through the
/// queue guarantees no two workers ever process the same transaction.
#[derive(Clone, Debug)]
pub struct Transaction {
    /// Sequence number within the replay workload.
    pub id: usize,
    /// Scheduled offset from batch start at which this transaction should
    /// be dispatched, in milliseconds.
    pub arrival_ms: u64,
    /// Simulated processing time, applied by the worker as an artificial
    /// hold, in milliseconds.
    pub service_delay_ms: u64,
    /// The subject entity identifier.
    pub subject: String,
    /// The object entity identifier.
    pub object: String,
    /// Ordered relation identifiers to apply against (subject, object).
    pub predicates: Vec<String>,
}

/// The completion record a worker writes for a transaction.
#[derive(Clone, Copy, Debug)]
pub struct Completion {
    /// The transaction's sequence number.
    pub id: usize,
    /// Statements committed by this transaction (0 when it failed).
    pub writes: usize,
    /// Wall-clock completion offset minus the arrival offset, or `None`
    /// when the store interaction failed.
    pub response_ms: Option<u64>,
}

/// The seeded random stream behind all arrival and service-delay draws.
#[derive(Debug)]
pub struct ArrivalSampler {
    rng: SmallRng,
}

impl ArrivalSampler {
    /// Creates a sampler seeded for reproducible runs.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Draws an exponentially distributed delay with the given mean, in
    /// milliseconds.
    ///
    /// Results are capped at `10 * mean_ms` so a single draw cannot stall
    /// the whole run; a zero mean always yields zero.
    pub fn draw_exp_ms(&mut self, mean_ms: u64) -> u64 {
        if mean_ms == 0 {
            return 0;
        }
        let exp = Exp::new(1.0 / mean_ms as f64).unwrap();
        let drawn = exp.sample(&mut self.rng) as u64;
        drawn.min(10 * mean_ms)
    }
}

/// Turns replay records into scheduled transactions.
///
/// Arrival offsets accumulate interarrival draws starting from zero, so
/// they are non-decreasing; service delays are drawn independently from
/// their own (generally larger) mean.
pub fn build_schedule(
    records: Vec<TxRecord>,
    first_id: usize,
    interarrival_mean_ms: u64,
    service_mean_ms: u64,
    sampler: &mut ArrivalSampler,
) -> Vec<Transaction> {
    let mut arrival_ms = 0;
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            arrival_ms += sampler.draw_exp_ms(interarrival_mean_ms);
            Transaction {
                id: first_id + index,
                arrival_ms,
                service_delay_ms: sampler.draw_exp_ms(service_mean_ms),
                subject: record.subject,
                object: record.object,
                predicates: record.predicates,
            }
        })
        .collect()
}
