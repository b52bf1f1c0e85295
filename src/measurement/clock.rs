//! The clock loop: run a test body `count` times and time the batch.
//!
//! Two batch shapes exist. The *inlined* shape is compiled at benchmark
//! construction, while the body's concrete type is still known: the timed
//! loop calls the body by static dispatch, so the optimizer can inline it
//! and no per-iteration call is paid. The *indirect* shape loops through the
//! type-erased body slot and is the fallback whenever the inlined shape is
//! unavailable or failed its pre-test.
//!
//! Every compiled batch embeds a process-unique tag and returns it alongside
//! the elapsed time. The pre-test trusts a batch only if the tag round-trips,
//! which catches bodies that hijack control flow around the timed loop.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::benchmark::Benchmark;
use crate::error::BenchError;
use crate::measurement::deferred;
use crate::measurement::timer::{black_box, Timer};

/// Per-batch setup or teardown hook, run outside the timed region.
pub(crate) type Hook = Arc<dyn Fn()>;

/// What a compiled batch hands back to the clock loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawClock {
    /// Elapsed seconds between the batch's start and stop timestamps.
    pub elapsed: f64,
    /// The integrity tag the batch was compiled with.
    pub tag: u64,
}

/// A measurement batch compiled over a concrete body type.
pub(crate) type CompiledBatch =
    Arc<dyn Fn(&Timer, u64, Option<&Hook>, Option<&Hook>) -> RawClock>;

/// The test body in its runnable forms.
#[derive(Clone)]
pub(crate) enum Body {
    /// Synchronous body: the type-erased slot plus, when the concrete type
    /// was available at construction, the statically dispatched batch.
    Sync {
        slot: Arc<dyn Fn()>,
        compiled: Option<CompiledBatch>,
    },
    /// Deferred body: invoked once per iteration with a resolve handle.
    Deferred {
        call: Arc<dyn Fn(deferred::Deferred)>,
    },
}

/// Which batch arrangement the next clock call will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BatchShape {
    Inlined,
    Indirect,
}

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique integrity tag.
pub(crate) fn next_tag() -> u64 {
    NEXT_TAG.fetch_add(1, Ordering::Relaxed)
}

/// Compile the inlined batch for a concrete body type.
pub(crate) fn compile_inlined<F>(body: Arc<F>, tag: u64) -> CompiledBatch
where
    F: Fn() + 'static,
{
    Arc::new(move |timer, count, setup, teardown| {
        if let Some(setup) = setup {
            setup();
        }
        let start = timer.now();
        for _ in 0..count {
            // Static dispatch through the concrete `F`; black_box keeps the
            // loop alive for bodies the optimizer would otherwise erase.
            black_box(body());
        }
        let elapsed = timer.now() - start;
        if let Some(teardown) = teardown {
            teardown();
        }
        RawClock { elapsed, tag }
    })
}

/// Run the indirect batch through the type-erased body slot.
fn run_indirect(
    slot: &Arc<dyn Fn()>,
    timer: &Timer,
    count: u64,
    setup: Option<&Hook>,
    teardown: Option<&Hook>,
    tag: u64,
) -> RawClock {
    if let Some(setup) = setup {
        setup();
    }
    let start = timer.now();
    for _ in 0..count {
        black_box(slot());
    }
    let elapsed = timer.now() - start;
    if let Some(teardown) = teardown {
        teardown();
    }
    RawClock { elapsed, tag }
}

/// Render a panic payload for the error record.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one batch in the given shape, converting a body panic into an error.
fn try_batch(
    bench: &Benchmark,
    shape: BatchShape,
    timer: &Timer,
    count: u64,
) -> Result<RawClock, String> {
    let Some(Body::Sync { slot, compiled }) = bench.body.as_ref() else {
        return Err("no synchronous body".to_string());
    };
    let setup = bench.setup.as_ref();
    let teardown = bench.teardown.as_ref();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| match shape {
        BatchShape::Inlined => match compiled {
            Some(batch) => batch(timer, count, setup, teardown),
            // Caller never asks for an inlined batch it does not have.
            None => run_indirect(slot, timer, count, setup, teardown, bench.tag),
        },
        BatchShape::Indirect => run_indirect(slot, timer, count, setup, teardown, bench.tag),
    }));
    outcome.map_err(panic_message)
}

/// Single-iteration pre-test: verify the batch is runnable and trustworthy,
/// demoting to the indirect shape or recording an error as needed.
fn pre_test(bench: &mut Benchmark, timer: &Timer) {
    let has_compiled = matches!(
        bench.body,
        Some(Body::Sync {
            compiled: Some(_),
            ..
        })
    );
    if !has_compiled {
        bench.shape = BatchShape::Indirect;
    }

    if bench.shape == BatchShape::Inlined {
        match try_batch(bench, BatchShape::Inlined, timer, 1) {
            Ok(raw) if raw.tag == bench.tag => return,
            // A wrong tag means the body returned through the outer frame;
            // the inlined shape cannot be trusted for this body.
            Ok(_) => bench.shape = BatchShape::Indirect,
            Err(_) => bench.shape = BatchShape::Indirect,
        }
    }

    match try_batch(bench, BatchShape::Indirect, timer, 1) {
        Ok(raw) if raw.tag == bench.tag => {}
        Ok(_) => bench.error = Some(BenchError::CompilationRefused),
        Err(message) => bench.error = Some(BenchError::PreTestThrew(message)),
    }
}

/// Clock one batch of `bench.count` iterations.
///
/// Returns the elapsed seconds, or zero when the batch could not run; in
/// that case the failure is recorded on `bench.error`. Deferred bodies are
/// clocked through the resolve protocol and return their own elapsed time.
pub(crate) fn clock(bench: &mut Benchmark, timer: &Timer) -> f64 {
    match bench.body {
        None => {
            bench.error = Some(BenchError::EmptyBody);
            0.0
        }
        Some(Body::Deferred { .. }) => deferred::clock_deferred(bench, timer),
        Some(Body::Sync { .. }) => {
            if !bench.checked {
                pre_test(bench, timer);
                bench.checked = true;
                if bench.error.is_some() {
                    return 0.0;
                }
            }
            match try_batch(bench, bench.shape, timer, bench.count) {
                Ok(raw) => raw.elapsed,
                Err(message) => {
                    bench.error = Some(BenchError::BodyThrewInRun(message));
                    0.0
                }
            }
        }
    }
}
