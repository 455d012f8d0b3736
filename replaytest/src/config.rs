use std::time::Duration;

use serde::Deserialize;

/// Harness configuration, loadable from a YAML file.
///
/// Every field has a default matching the reference workload geometry, so a
/// config file only needs to name the knobs it changes.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed for the random stream driving arrival and service-delay draws.
    /// Runs with the same seed and log replay the same schedule.
    pub seed: u64,

    /// Number of transactions the dispatch queue can hold.
    pub queue_capacity: usize,

    /// Size of the worker cohort spawned at the start of each chunk.
    pub initial_workers: usize,

    /// Hard cap on the number of workers the pool may grow to.
    pub max_workers: usize,

    /// Number of transactions per rate chunk.
    pub chunk_size: usize,

    /// Mean interarrival time in milliseconds for each rate chunk, swept in
    /// order. Zero means maximum rate.
    pub lambda_steps_ms: Vec<u64>,

    /// Mean simulated service time in milliseconds.
    pub service_delay_mean_ms: u64,

    /// Cadence of dispatcher diagnostic snapshots.
    #[serde(with = "humantime_serde")]
    pub snapshot_interval: Duration,

    /// Re-check interval while waiting for the worker pool to drain.
    #[serde(with = "humantime_serde")]
    pub drain_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: 1,
            queue_capacity: 1024,
            initial_workers: 10,
            max_workers: 100,
            chunk_size: 10_000,
            lambda_steps_ms: vec![300, 200, 100, 80, 60, 40, 20, 10, 5, 0],
            service_delay_mean_ms: 2000,
            snapshot_interval: Duration::from_secs(10),
            drain_poll_interval: Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_geometry() {
        let config = Config::default();
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.initial_workers, 10);
        assert_eq!(config.max_workers, 100);
        assert_eq!(config.lambda_steps_ms.last(), Some(&0));
    }

    #[test]
    fn partial_yaml_overrides_defaults() {
        let config: Config = serde_yaml::from_str(
            r#"
            seed: 42
            max_workers: 8
            snapshot_interval: 2s
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, 42);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.snapshot_interval, Duration::from_secs(2));
        assert_eq!(config.chunk_size, 10_000);
    }
}
