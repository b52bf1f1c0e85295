//! The deferred-cycle protocol.
//!
//! A deferred body does not return to signal completion; it calls
//! [`Deferred::resolve`], possibly from another thread. The clock loop
//! starts the timer, invokes the body once per iteration, and parks on a
//! condvar until the pending iteration resolves. The final resolve stamps
//! the stop time itself, so scheduler wake-up latency on the measuring side
//! never inflates the batch.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::benchmark::Benchmark;
use crate::error::BenchError;
use crate::event::EventKind;
use crate::measurement::clock::{panic_message, Body};
use crate::measurement::timer::Timer;

/// Shared state of one in-flight deferred batch.
struct DeferredState {
    /// Completions recorded within the current batch.
    cycles: u64,
    /// Iterations this batch will run.
    target: u64,
    /// Whether an iteration is currently awaiting its resolve.
    pending: bool,
    /// Stop timestamp recorded by the final resolve.
    stop: Option<f64>,
    /// A resolve arrived with no iteration pending.
    double_resolve: bool,
}

struct DeferredInner {
    state: Mutex<DeferredState>,
    signal: Condvar,
    timer: Timer,
}

/// Completion handle passed to a deferred test body.
///
/// Clone it freely and move it wherever the body finishes its work; calling
/// [`resolve`](Self::resolve) exactly once per iteration drives the batch
/// forward. Resolving more than once per iteration is undefined and is
/// reported as [`BenchError::DeferredDoubleResolve`] when detected.
#[derive(Clone)]
pub struct Deferred {
    inner: Arc<DeferredInner>,
}

impl Deferred {
    /// Record the completion of the current iteration.
    pub fn resolve(&self) {
        let mut state = lock(&self.inner.state);
        if !state.pending {
            state.double_resolve = true;
            self.inner.signal.notify_all();
            return;
        }
        state.pending = false;
        state.cycles += 1;
        if state.cycles >= state.target {
            // Stamp the stop time here rather than on the waiting side, so
            // the measurement ends when the work ends.
            state.stop = Some(self.inner.timer.now());
        }
        self.inner.signal.notify_all();
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("Deferred")
            .field("cycles", &state.cycles)
            .field("target", &state.target)
            .field("pending", &state.pending)
            .finish()
    }
}

fn lock<'a>(mutex: &'a Mutex<DeferredState>) -> std::sync::MutexGuard<'a, DeferredState> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// How long to wait for a single resolve before declaring the timer lost.
fn resolve_timeout(bench: &Benchmark) -> Duration {
    Duration::from_secs_f64(bench.options.max_time.max(1.0))
}

/// Clock one deferred batch of `bench.count` iterations.
///
/// Returns the elapsed seconds between the timer start and the final
/// resolve, or zero with `bench.error` set when the protocol failed.
pub(crate) fn clock_deferred(bench: &mut Benchmark, timer: &Timer) -> f64 {
    let Some(Body::Deferred { call }) = bench.body.clone() else {
        bench.error = Some(BenchError::EmptyBody);
        return 0.0;
    };
    let count = bench.count.max(1);
    let timeout = resolve_timeout(bench);

    if let Some(setup) = bench.setup.clone() {
        setup();
    }

    let inner = Arc::new(DeferredInner {
        state: Mutex::new(DeferredState {
            cycles: 0,
            target: count,
            pending: false,
            stop: None,
            double_resolve: false,
        }),
        signal: Condvar::new(),
        timer: timer.clone(),
    });

    let start = timer.now();
    let mut failure = None;

    for _ in 0..count {
        if bench.aborted {
            break;
        }
        lock(&inner.state).pending = true;
        let handle = Deferred {
            inner: Arc::clone(&inner),
        };
        let body = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| call(handle)));
        if let Err(payload) = body {
            failure = Some(BenchError::BodyThrewInRun(panic_message(payload)));
            break;
        }

        let mut state = lock(&inner.state);
        while state.pending && !state.double_resolve {
            let (next, wait) = inner
                .signal
                .wait_timeout(state, timeout)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state = next;
            if wait.timed_out() && state.pending {
                failure = Some(BenchError::TimerStopFailed);
                break;
            }
        }
        if state.double_resolve {
            failure = Some(BenchError::DeferredDoubleResolve);
        }
        if failure.is_some() {
            break;
        }
    }

    if let Some(teardown) = bench.teardown.clone() {
        teardown();
    }

    if bench.aborted {
        // Aborted mid-batch: unblock the cycle controller with a synthetic
        // cycle and report nothing measured.
        bench.running = false;
        let mut event = bench.new_event(EventKind::Cycle);
        bench.emit(&mut event);
        return 0.0;
    }

    if let Some(error) = failure {
        bench.error = Some(error);
        return 0.0;
    }

    let stop = lock(&inner.state).stop;
    match stop {
        Some(stop) => stop - start,
        None => {
            bench.error = Some(BenchError::TimerStopFailed);
            0.0
        }
    }
}
