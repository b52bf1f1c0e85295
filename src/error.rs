//! Failure kinds surfaced by the measurement engine.
//!
//! Measurement-path failures are recorded on `Benchmark::error` and announced
//! through `cycle`/`error` events rather than bubbling up the call stack: a
//! failed benchmark must not take down the run that contains it. Only timer
//! selection reports through `Result`, because without a usable clock the
//! library cannot do anything at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything that can go wrong while clocking a benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BenchError {
    /// The benchmark has no test body to run.
    #[error("benchmark has no test body")]
    EmptyBody,

    /// The test body failed during the single-iteration pre-test.
    #[error("test body failed during pre-test: {0}")]
    PreTestThrew(String),

    /// The test body failed while the real measurement batch was running.
    #[error("test body failed during measurement: {0}")]
    BodyThrewInRun(String),

    /// Every candidate time source probed as broken.
    #[error("no usable timer source on this host")]
    NoUsableTimer,

    /// The per-iteration time stayed below timer resolution even after the
    /// iteration count was grown through the whole escalation schedule.
    #[error("operation is faster than the timer can measure")]
    UnclockableRate,

    /// A deferred test body called `resolve` with no iteration pending.
    #[error("deferred test resolved more than once per iteration")]
    DeferredDoubleResolve,

    /// A deferred test body never resolved, so the timer was never stopped.
    #[error("deferred test never stopped its timer")]
    TimerStopFailed,

    /// Neither batch shape could be used to clock the test body.
    #[error("no runnable measurement batch for this test body")]
    CompilationRefused,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            BenchError::EmptyBody.to_string(),
            "benchmark has no test body"
        );
        assert_eq!(
            BenchError::PreTestThrew("boom".into()).to_string(),
            "test body failed during pre-test: boom"
        );
        assert_eq!(
            BenchError::NoUsableTimer.to_string(),
            "no usable timer source on this host"
        );
    }

    #[test]
    fn round_trips_through_serde() {
        let err = BenchError::BodyThrewInRun("overflow".into());
        let json = serde_json::to_string(&err).unwrap();
        let back: BenchError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
