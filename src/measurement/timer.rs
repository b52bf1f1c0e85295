//! Time source selection and resolution probing.
//!
//! The engine never assumes a clock. Candidate sources register with a
//! [`TimerRegistry`]; each is probed for its practical resolution and the
//! finest-grained working candidate becomes the process timer. A candidate
//! that reports a non-positive delta, or fails to tick at all, is broken and
//! probes as infinitely coarse.

use std::hint::black_box as std_black_box;
use std::sync::{Arc, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::constants::{
    MIN_TIME_FLOOR, RESOLUTION_PROBE_ITERS, RESOLUTION_PROBE_SPIN_CAP, UNCERTAINTY_TARGET,
    WALL_CLOCK_RESOLUTION_FLOOR,
};
use crate::error::BenchError;

/// Wrapper around `std::hint::black_box` for preventing compiler
/// optimizations.
///
/// Wrap the measured call so the optimizer can neither remove the work nor
/// hoist it across the timestamps.
#[inline]
pub fn black_box<T>(x: T) -> T {
    std_black_box(x)
}

/// A candidate clock.
///
/// `now` returns seconds as `f64`; a monotonic source is strongly preferred.
/// Implementations must be cheap to call, since the clock loop reads the
/// time on both sides of every batch.
pub trait TimeSource: Send + Sync {
    /// Short identifier for diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this source works on the current host.
    fn supported(&self) -> bool {
        true
    }

    /// Current time in seconds.
    fn now(&self) -> f64;

    /// Lower bound imposed on the probed resolution, seconds.
    fn resolution_floor(&self) -> f64 {
        0.0
    }
}

/// High-resolution monotonic source backed by `Instant`, anchored at first
/// use so readings fit comfortably in an `f64`.
#[derive(Debug, Default)]
pub struct InstantSource;

impl TimeSource for InstantSource {
    fn name(&self) -> &'static str {
        "instant"
    }

    fn now(&self) -> f64 {
        static ANCHOR: OnceLock<Instant> = OnceLock::new();
        ANCHOR.get_or_init(Instant::now).elapsed().as_secs_f64()
    }
}

/// Wall-clock source quantized to milliseconds, the coarse fallback.
#[derive(Debug, Default)]
pub struct WallClockSource;

impl TimeSource for WallClockSource {
    fn name(&self) -> &'static str {
        "wallclock-ms"
    }

    fn now(&self) -> f64 {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        millis as f64 / 1e3
    }

    fn resolution_floor(&self) -> f64 {
        WALL_CLOCK_RESOLUTION_FLOOR
    }
}

/// Estimate the smallest duration `source` can distinguish.
///
/// Each probe iteration spins until the source reports a nonzero delta and
/// records it; the resolution is the mean of the recorded deltas, floored by
/// the source's own minimum. A negative delta, or a source that never ticks
/// within the spin cap, yields infinity.
pub fn probe_resolution(source: &dyn TimeSource) -> f64 {
    let mut deltas = Vec::with_capacity(RESOLUTION_PROBE_ITERS);
    for _ in 0..RESOLUTION_PROBE_ITERS {
        let begin = source.now();
        let mut measured = source.now() - begin;
        let mut spins = 0usize;
        while measured == 0.0 {
            spins += 1;
            if spins > RESOLUTION_PROBE_SPIN_CAP {
                return f64::INFINITY;
            }
            measured = source.now() - begin;
        }
        if measured < 0.0 {
            return f64::INFINITY;
        }
        deltas.push(measured);
    }
    let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
    mean.max(source.resolution_floor())
}

/// A selected clock: the winning source plus its probed resolution.
#[derive(Clone)]
pub struct Timer {
    source: Arc<dyn TimeSource>,
    resolution: f64,
}

impl Timer {
    /// Build a timer from an explicit source and resolution, bypassing the
    /// probe. This is also the seam tests use to inject synthetic clocks.
    pub fn with_source<S: TimeSource + 'static>(source: S, resolution: f64) -> Self {
        Self {
            source: Arc::new(source),
            resolution,
        }
    }

    /// Current time in seconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.source.now()
    }

    /// Name of the underlying source.
    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Probed resolution in seconds.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Default per-cycle minimum time for this clock: long enough that
    /// quantization error stays at or below the uncertainty target, never
    /// below the global floor.
    pub fn default_min_time(&self) -> f64 {
        (self.resolution / 2.0 / UNCERTAINTY_TARGET).max(MIN_TIME_FLOOR)
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("source", &self.source.name())
            .field("resolution", &self.resolution)
            .finish()
    }
}

/// Ordered list of candidate time sources.
pub struct TimerRegistry {
    candidates: Vec<Arc<dyn TimeSource>>,
}

impl TimerRegistry {
    /// Registry with the built-in candidates: the monotonic nanosecond
    /// source first, the millisecond wall clock as fallback.
    pub fn with_defaults() -> Self {
        Self {
            candidates: vec![Arc::new(InstantSource), Arc::new(WallClockSource)],
        }
    }

    /// Empty registry; callers register their own sources.
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    /// Add a candidate. Probe order follows registration order.
    pub fn register<S: TimeSource + 'static>(&mut self, source: S) -> &mut Self {
        self.candidates.push(Arc::new(source));
        self
    }

    /// Probe every supported candidate and select the finest resolution.
    /// Earlier registration wins ties.
    pub fn select(&self) -> Result<Timer, BenchError> {
        let mut best: Option<(Arc<dyn TimeSource>, f64)> = None;
        for candidate in &self.candidates {
            if !candidate.supported() {
                continue;
            }
            let resolution = probe_resolution(candidate.as_ref());
            if !resolution.is_finite() {
                continue;
            }
            let better = match &best {
                Some((_, current)) => resolution < *current,
                None => true,
            };
            if better {
                best = Some((Arc::clone(candidate), resolution));
            }
        }
        let (source, resolution) = best.ok_or(BenchError::NoUsableTimer)?;
        Ok(Timer { source, resolution })
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// The process-wide timer, selected once from the default registry.
pub(crate) fn shared_timer() -> Result<Timer, BenchError> {
    static SHARED: OnceLock<Option<Timer>> = OnceLock::new();
    SHARED
        .get_or_init(|| TimerRegistry::with_defaults().select().ok())
        .clone()
        .ok_or(BenchError::NoUsableTimer)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A clock that never advances.
    struct FrozenSource;

    impl TimeSource for FrozenSource {
        fn name(&self) -> &'static str {
            "frozen"
        }
        fn now(&self) -> f64 {
            42.0
        }
    }

    /// A clock that runs backwards.
    struct BackwardsSource {
        state: std::sync::atomic::AtomicU64,
    }

    impl TimeSource for BackwardsSource {
        fn name(&self) -> &'static str {
            "backwards"
        }
        fn now(&self) -> f64 {
            let n = self
                .state
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            1e6 - n as f64
        }
    }

    #[test]
    fn instant_source_probes_finite() {
        let res = probe_resolution(&InstantSource);
        assert!(res.is_finite());
        assert!(res > 0.0);
        // Anything coarser than a millisecond would mean Instant is broken.
        assert!(res < 1e-3, "resolution {res} too coarse");
    }

    #[test]
    fn wall_clock_floor_applies() {
        let res = probe_resolution(&WallClockSource);
        assert!(res >= WALL_CLOCK_RESOLUTION_FLOOR);
    }

    #[test]
    fn frozen_source_probes_broken() {
        assert!(probe_resolution(&FrozenSource).is_infinite());
    }

    #[test]
    fn backwards_source_probes_broken() {
        let src = BackwardsSource {
            state: std::sync::atomic::AtomicU64::new(0),
        };
        assert!(probe_resolution(&src).is_infinite());
    }

    #[test]
    fn default_registry_prefers_the_fine_source() {
        let timer = TimerRegistry::with_defaults().select().unwrap();
        assert_eq!(timer.source_name(), "instant");
        assert!(timer.resolution() < WALL_CLOCK_RESOLUTION_FLOOR);
    }

    #[test]
    fn empty_registry_has_no_usable_timer() {
        let registry = TimerRegistry::new();
        assert_eq!(registry.select().unwrap_err(), BenchError::NoUsableTimer);
    }

    #[test]
    fn default_min_time_has_a_floor() {
        let timer = TimerRegistry::with_defaults().select().unwrap();
        assert!(timer.default_min_time() >= MIN_TIME_FLOOR);
        // A coarse synthetic timer pushes the default above the floor.
        let coarse = Timer::with_source(InstantSource, 0.002);
        assert!((coarse.default_min_time() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn timer_now_is_monotonic() {
        let timer = Timer::with_source(InstantSource, 1e-9);
        let a = timer.now();
        let b = timer.now();
        assert!(b >= a);
    }
}
