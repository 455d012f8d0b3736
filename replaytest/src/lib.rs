//! A load-generation harness that replays a recorded transaction log
//! against a triple store, injecting transactions at controlled,
//! time-varying arrival rates while an elastic pool of worker tasks
//! executes them, and records per-transaction response times.
//!
//! The paced engine is built from a seeded exponential [`workload`]
//! schedule, a bounded [`queue`], an elastic worker [`pool`], and a single
//! [`dispatch`] control loop that feeds the queue by arrival time and
//! grows the pool under saturation. [`report`] turns each drained chunk
//! into console statistics and the run's output record.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod dispatch;
pub mod pool;
pub mod queue;
pub mod report;
pub mod runner;
pub mod txlog;
pub mod workload;
