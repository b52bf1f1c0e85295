//! The benchmark: a named test body plus its measurement state and results.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::BenchOptions;
use crate::error::BenchError;
use crate::event::{CycleReport, Event, EventKind, EventTarget, Listeners};
use crate::measurement::clock::{compile_inlined, next_tag, BatchShape, Body, Hook};
use crate::measurement::cycle::run_cycles;
use crate::measurement::deferred::Deferred;
use crate::measurement::timer::{shared_timer, Timer};
use crate::sampling::run_sampling;
use crate::statistics::{compare_samples, Stats};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Timing record of the most recent measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Times {
    /// Seconds the definitive clock batch took.
    pub cycle: f64,
    /// Total seconds the completed run took, measured on the selected timer.
    pub elapsed: f64,
    /// Seconds per operation.
    pub period: f64,
    /// Timer reading when the run started.
    pub time_stamp: f64,
}

/// Reentrancy guards between `abort` and `reset`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Guards {
    pub abort: bool,
    pub reset: bool,
}

/// A single benchmark: configuration, test body, counters, and results.
///
/// Construct one with [`Benchmark::new`] (synchronous body) or
/// [`Benchmark::deferred`] (body that resolves explicitly), tune it with the
/// builder setters, then call [`run`](Self::run). Completion is signalled by
/// the `complete` event; afterwards `hz`, `stats`, and `times` carry the
/// results.
///
/// # Example
///
/// ```no_run
/// use microbench::Benchmark;
///
/// let mut bench = Benchmark::new("itoa", || {
///     std::hint::black_box(42u64.to_string());
/// })
/// .max_time(1.0);
/// bench.run();
/// println!("{bench}");
/// ```
pub struct Benchmark {
    /// Display name.
    pub name: String,
    /// Process-unique id.
    pub id: u64,
    /// Configuration, immutable while a run is in flight.
    pub options: BenchOptions,
    /// Iterations per cycle.
    pub count: u64,
    /// Cycles completed.
    pub cycles: u64,
    /// Operations per second; the reciprocal of the mean period.
    pub hz: f64,
    /// Timing record of the latest measurement.
    pub times: Times,
    /// Sample distribution and derived statistics.
    pub stats: Stats,
    /// Whether a run is in flight.
    pub running: bool,
    /// Whether the last run was aborted.
    pub aborted: bool,
    /// The failure that ended the last run, if any.
    pub error: Option<BenchError>,

    pub(crate) body: Option<Body>,
    pub(crate) setup: Option<Hook>,
    pub(crate) teardown: Option<Hook>,
    pub(crate) source_id: Option<u64>,
    pub(crate) listeners: Listeners,
    pub(crate) timer: Option<Timer>,
    pub(crate) shape: BatchShape,
    pub(crate) checked: bool,
    pub(crate) guards: Guards,
    pub(crate) tag: u64,
}

impl Benchmark {
    fn from_parts(name: String, body: Option<Body>, tag: u64, defer: bool) -> Self {
        let shape = match &body {
            Some(Body::Sync {
                compiled: Some(_), ..
            }) => BatchShape::Inlined,
            _ => BatchShape::Indirect,
        };
        Self {
            name,
            id: next_id(),
            options: BenchOptions {
                defer,
                ..BenchOptions::default()
            },
            count: 0,
            cycles: 0,
            hz: 0.0,
            times: Times::default(),
            stats: Stats::default(),
            running: false,
            aborted: false,
            error: None,
            body,
            setup: None,
            teardown: None,
            source_id: None,
            listeners: Listeners::default(),
            timer: None,
            shape,
            checked: false,
            guards: Guards::default(),
            tag,
        }
    }

    /// Benchmark with a synchronous test body.
    ///
    /// The body's concrete type is captured here, so the measurement loop
    /// calls it by static dispatch with no per-iteration call overhead.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn() + 'static,
    {
        let tag = next_tag();
        let body = Arc::new(body);
        let compiled = compile_inlined(Arc::clone(&body), tag);
        let slot: Arc<dyn Fn()> = body;
        Self::from_parts(
            name.into(),
            Some(Body::Sync {
                slot,
                compiled: Some(compiled),
            }),
            tag,
            false,
        )
    }

    /// Benchmark over an already type-erased body.
    ///
    /// Without the concrete type there is nothing to inline; the indirect
    /// batch shape is used from the start.
    pub fn new_boxed(name: impl Into<String>, body: Box<dyn Fn()>) -> Self {
        let tag = next_tag();
        Self::from_parts(
            name.into(),
            Some(Body::Sync {
                slot: Arc::from(body),
                compiled: None,
            }),
            tag,
            false,
        )
    }

    /// Benchmark whose body signals completion through a [`Deferred`]
    /// handle instead of returning.
    pub fn deferred<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Deferred) + 'static,
    {
        let tag = next_tag();
        Self::from_parts(
            name.into(),
            Some(Body::Deferred {
                call: Arc::new(body),
            }),
            tag,
            true,
        )
    }

    /// Benchmark with no test body. Running it fails with
    /// [`BenchError::EmptyBody`].
    pub fn named(name: impl Into<String>) -> Self {
        Self::from_parts(name.into(), None, next_tag(), false)
    }

    // ------------------------------------------------------------------
    // Builder setters
    // ------------------------------------------------------------------

    /// Target duration of a single clock batch, seconds.
    pub fn min_time(mut self, seconds: f64) -> Self {
        self.options.min_time = Some(seconds);
        self
    }

    /// Total clocking budget, seconds.
    pub fn max_time(mut self, seconds: f64) -> Self {
        self.options.max_time = seconds;
        self
    }

    /// Minimum number of samples before the budget may end the run.
    pub fn min_samples(mut self, samples: usize) -> Self {
        self.options.min_samples = samples;
        self
    }

    /// Pause between cycles, seconds.
    pub fn delay(mut self, seconds: f64) -> Self {
        self.options.delay = seconds;
        self
    }

    /// Iterations the first cycle starts from.
    pub fn init_count(mut self, count: u64) -> Self {
        self.options.init_count = count.max(1);
        self
    }

    /// Pause for `delay` between cycles instead of running back-to-back.
    pub fn run_async(mut self, yes: bool) -> Self {
        self.options.run_async = yes;
        self
    }

    /// Replace the whole option bag. The `defer` flag always tracks the
    /// body the benchmark was constructed with.
    pub fn with_options(mut self, options: BenchOptions) -> Self {
        let defer = matches!(self.body, Some(Body::Deferred { .. }));
        self.options = BenchOptions { defer, ..options };
        self
    }

    /// Per-batch setup hook, run before each batch outside the timed region.
    pub fn setup<F: Fn() + 'static>(mut self, hook: F) -> Self {
        self.setup = Some(Arc::new(hook));
        self
    }

    /// Per-batch teardown hook, run after each batch outside the timed
    /// region.
    pub fn teardown<F: Fn() + 'static>(mut self, hook: F) -> Self {
        self.teardown = Some(Arc::new(hook));
        self
    }

    /// Measure with an explicit timer instead of the process-wide one.
    pub fn with_timer(mut self, timer: Timer) -> Self {
        self.timer = Some(timer);
        self
    }

    fn with_listener<F>(mut self, kind: EventKind, listener: F) -> Self
    where
        F: FnMut(&mut Event) + 'static,
    {
        self.listeners.on(kind, listener);
        self
    }

    /// Listener for the `start` event.
    pub fn on_start<F: FnMut(&mut Event) + 'static>(self, listener: F) -> Self {
        self.with_listener(EventKind::Start, listener)
    }

    /// Listener for `cycle` events.
    pub fn on_cycle<F: FnMut(&mut Event) + 'static>(self, listener: F) -> Self {
        self.with_listener(EventKind::Cycle, listener)
    }

    /// Listener for `error` events.
    pub fn on_error<F: FnMut(&mut Event) + 'static>(self, listener: F) -> Self {
        self.with_listener(EventKind::Error, listener)
    }

    /// Listener for `abort` events.
    pub fn on_abort<F: FnMut(&mut Event) + 'static>(self, listener: F) -> Self {
        self.with_listener(EventKind::Abort, listener)
    }

    /// Listener for `reset` events.
    pub fn on_reset<F: FnMut(&mut Event) + 'static>(self, listener: F) -> Self {
        self.with_listener(EventKind::Reset, listener)
    }

    /// Listener for the `complete` event.
    pub fn on_complete<F: FnMut(&mut Event) + 'static>(self, listener: F) -> Self {
        self.with_listener(EventKind::Complete, listener)
    }

    // ------------------------------------------------------------------
    // Event surface
    // ------------------------------------------------------------------

    /// Register a listener for `kind`.
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> &mut Self
    where
        F: FnMut(&mut Event) + 'static,
    {
        self.listeners.on(kind, listener);
        self
    }

    /// Remove every listener registered for `kind`.
    pub fn off(&mut self, kind: EventKind) -> &mut Self {
        self.listeners.off(kind);
        self
    }

    /// Remove all listeners.
    pub fn off_all(&mut self) -> &mut Self {
        self.listeners.off_all();
        self
    }

    /// Number of listeners registered for `kind`.
    pub fn listeners(&self, kind: EventKind) -> usize {
        self.listeners.count(kind)
    }

    /// Dispatch an event to this benchmark's listeners.
    pub fn emit(&self, event: &mut Event) {
        self.listeners.emit(event);
    }

    /// Identity used as an event target.
    pub(crate) fn target(&self) -> EventTarget {
        EventTarget {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// Build an event for this benchmark with a progress snapshot attached.
    pub(crate) fn new_event(&self, kind: EventKind) -> Event {
        let mut event = Event::new(kind, self.target());
        event.result = Some(CycleReport {
            count: self.count,
            cycles: self.cycles,
            hz: self.hz,
            period: self.times.period,
            elapsed: self.times.cycle,
            sample_len: self.stats.sample.len(),
            mean: self.stats.mean,
            rme: self.stats.rme,
        });
        event.error = self.error.clone();
        if kind == EventKind::Error {
            event.message = self.error.as_ref().map(BenchError::to_string);
        }
        event
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start measuring.
    ///
    /// Blocks until the run completes; events fire synchronously on the
    /// calling thread. A clone created by [`clone`](Self::clone) runs bare
    /// measurement cycles; any other benchmark runs the full sampling
    /// controller.
    pub fn run(&mut self) -> &mut Self {
        if self.running {
            return self;
        }
        self.error = None;
        self.aborted = false;

        let timer = match &self.timer {
            Some(timer) => timer.clone(),
            None => match shared_timer() {
                Ok(timer) => timer,
                Err(error) => {
                    self.error = Some(error);
                    let mut event = self.new_event(EventKind::Error);
                    self.emit(&mut event);
                    return self;
                }
            },
        };

        self.running = true;
        self.count = self.options.init_count;
        self.cycles = 0;
        self.times.time_stamp = timer.now();

        let mut start = self.new_event(EventKind::Start);
        self.emit(&mut start);
        if start.cancelled {
            self.running = false;
            return self;
        }

        let min_time = self.resolved_min_time(&timer);
        if self.source_id.is_some() {
            run_cycles(self, &timer, min_time, None);
        } else {
            run_sampling(self, &timer);
        }
        self
    }

    /// Abort the in-flight run.
    ///
    /// Cooperative: listeners see an `abort` event first and may cancel it.
    /// The failure record (`error`) survives an abort; only an explicit
    /// [`reset`](Self::reset) clears it.
    pub fn abort(&mut self) -> &mut Self {
        if !self.running {
            return self;
        }
        let resetting = self.guards.reset;
        let mut event = self.new_event(EventKind::Abort);
        self.emit(&mut event);
        if !event.cancelled || resetting {
            self.guards.abort = true;
            self.reset();
            self.guards.abort = false;
            if !resetting {
                self.aborted = true;
            }
            self.running = false;
        }
        self
    }

    /// Restore the benchmark to the state it had just after construction.
    ///
    /// Emits a cancellable `reset` event. A reset while running aborts the
    /// run first.
    pub fn reset(&mut self) -> &mut Self {
        if self.running && !self.guards.abort {
            self.guards.reset = true;
            self.abort();
            self.guards.reset = false;
            self.restore_initial(false);
            return self;
        }
        let keep_failure = self.guards.abort;
        if !self.is_pristine() {
            let mut event = self.new_event(EventKind::Reset);
            self.emit(&mut event);
            if !event.cancelled {
                self.restore_initial(keep_failure);
            }
        }
        self
    }

    /// Wipe measurement state. The failure record survives when the wipe
    /// was initiated by an abort.
    fn restore_initial(&mut self, keep_failure: bool) {
        self.count = 0;
        self.cycles = 0;
        self.hz = 0.0;
        self.times = Times::default();
        self.stats.clear();
        self.running = false;
        if !keep_failure {
            self.error = None;
            self.aborted = false;
        }
    }

    /// Clone-local abort bookkeeping, used when the abort has already been
    /// announced through the sampling bridge.
    pub(crate) fn teardown_after_abort(&mut self) {
        self.restore_initial(true);
        self.aborted = true;
        self.running = false;
    }

    fn is_pristine(&self) -> bool {
        self.count == 0
            && self.cycles == 0
            && self.hz == 0.0
            && self.times == Times::default()
            && self.stats == Stats::default()
            && self.error.is_none()
            && !self.aborted
            && !self.running
    }

    /// The effective per-cycle minimum time for this run.
    pub(crate) fn resolved_min_time(&self, timer: &Timer) -> f64 {
        self.options
            .min_time
            .unwrap_or_else(|| timer.default_min_time())
    }

    // ------------------------------------------------------------------
    // Cloning and comparison
    // ------------------------------------------------------------------

    /// Detached copy sharing this benchmark's configuration, body, hooks,
    /// and listeners, with fresh counters and a back-pointer to this
    /// benchmark. Running a clone performs bare measurement cycles without
    /// the sampling controller.
    pub fn clone(&self) -> Benchmark {
        self.clone_with(self.options.clone())
    }

    /// Like [`clone`](Self::clone) with replacement options.
    pub fn clone_with(&self, options: BenchOptions) -> Benchmark {
        let defer = matches!(self.body, Some(Body::Deferred { .. }));
        Benchmark {
            name: self.name.clone(),
            id: next_id(),
            options: BenchOptions { defer, ..options },
            count: 0,
            cycles: 0,
            hz: 0.0,
            times: Times::default(),
            stats: Stats::default(),
            running: false,
            aborted: false,
            error: None,
            body: self.body.clone(),
            setup: self.setup.clone(),
            teardown: self.teardown.clone(),
            source_id: Some(self.id),
            listeners: self.listeners.clone(),
            timer: self.timer.clone(),
            shape: self.shape,
            checked: false,
            guards: Guards::default(),
            tag: self.tag,
        }
    }

    /// Clone used by the sampling controller: no listeners of its own, all
    /// events travel through the bridge.
    pub(crate) fn clone_for_sampling(&self) -> Benchmark {
        let mut clone = self.clone();
        clone.listeners = Listeners::default();
        clone
    }

    /// Id of the benchmark this one was cloned from, if any.
    pub fn source(&self) -> Option<u64> {
        self.source_id
    }

    /// Mann–Whitney U comparison of two finished benchmarks' samples.
    ///
    /// Returns `1` when `self` is significantly faster, `-1` when `other`
    /// is, and `0` when the difference is not significant.
    pub fn compare(&self, other: &Benchmark) -> i32 {
        if self.id == other.id {
            return 0;
        }
        compare_samples(&self.stats.sample, &other.stats.sample)
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::output::format_benchmark(self))
    }
}

impl fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Benchmark")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("count", &self.count)
            .field("cycles", &self.cycles)
            .field("hz", &self.hz)
            .field("times", &self.times)
            .field("stats", &self.stats)
            .field("running", &self.running)
            .field("aborted", &self.aborted)
            .field("error", &self.error)
            .field("source_id", &self.source_id)
            .finish()
    }
}
