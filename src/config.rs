//! Benchmark configuration.

use serde::{Deserialize, Serialize};

/// Configuration options for a `Benchmark`.
///
/// All durations are seconds. Options are immutable once a run starts; the
/// sampling controller snapshots what it needs at the start of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchOptions {
    /// Pause between cycles when running asynchronously (default: 0.005).
    ///
    /// Delays never count toward `max_time`.
    pub delay: f64,

    /// Iterations the first cycle starts from (default: 1).
    ///
    /// The sampling controller carries the discovered per-cycle count forward
    /// through this field between clones and restores the configured value
    /// when the run finishes.
    pub init_count: u64,

    /// Total clocking budget for one benchmark, seconds (default: 5.0).
    ///
    /// A soft bound: it is checked after each sample, never mid-batch.
    pub max_time: f64,

    /// Minimum number of samples to gather before `max_time` can end the
    /// run (default: 5).
    pub min_samples: usize,

    /// Target duration of a single clock batch, seconds.
    ///
    /// `None` (the default) derives the value from the selected timer's
    /// resolution so that quantization error stays at or below 1%.
    pub min_time: Option<f64>,

    /// Pause for `delay` seconds between cycles instead of running them
    /// back-to-back (default: false).
    #[serde(rename = "async")]
    pub run_async: bool,

    /// The test body signals completion explicitly through a `Deferred`
    /// handle (default: false). Set by the deferred constructor.
    pub defer: bool,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            delay: 0.005,
            init_count: 1,
            max_time: 5.0,
            min_samples: 5,
            min_time: None,
            run_async: false,
            defer: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = BenchOptions::default();
        assert_eq!(opts.delay, 0.005);
        assert_eq!(opts.init_count, 1);
        assert_eq!(opts.max_time, 5.0);
        assert_eq!(opts.min_samples, 5);
        assert_eq!(opts.min_time, None);
        assert!(!opts.run_async);
        assert!(!opts.defer);
    }

    #[test]
    fn async_key_serializes_under_its_wire_name() {
        let json = serde_json::to_string(&BenchOptions::default()).unwrap();
        assert!(json.contains("\"async\":false"));
    }
}
