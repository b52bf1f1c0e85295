//! The sampling controller.
//!
//! Repeatedly measures a benchmark by running disposable clones through the
//! queue-mode invoker, one clone at a time with the next pre-seeded. Each
//! finished clone contributes its definitive period as one sample; the
//! running statistics are recomputed with every push. The run stops once
//! the minimum sample size is met and the clocking budget is spent, or
//! immediately when the benchmark aborts or proves unclockable.
//!
//! Clones carry no listeners of their own. A bridge closure owned by this
//! module translates clone events onto the source benchmark: `start` seeds
//! the clone's count, `error` copies the failure across, `abort` aborts the
//! source, and everything else is re-emitted with the source as target.

pub(crate) mod invoker;

use std::collections::VecDeque;

use crate::benchmark::{Benchmark, Times};
use crate::event::{Event, EventKind};
use crate::measurement::cycle::run_cycles;
use crate::measurement::timer::Timer;

use invoker::{invoke_queue, QueueHooks};

/// State threaded through one sampling run.
struct SampleCtx<'a> {
    bench: &'a mut Benchmark,
    timer: Timer,
    /// Accumulated clocking time, seconds. Excludes inter-cycle delays.
    elapsed: f64,
    /// Timer reading when the run began.
    initial: f64,
    /// The configured `init_count`, restored at termination.
    saved_init_count: u64,
}

/// Translate one clone event onto the source benchmark.
fn forward(source: &mut Benchmark, clone: &mut Benchmark, event: &mut Event) {
    if source.running {
        match event.kind {
            EventKind::Start => {
                clone.count = source.options.init_count;
            }
            EventKind::Abort => {
                source.abort();
                let mut synthetic = source.new_event(EventKind::Cycle);
                source.emit(&mut synthetic);
            }
            EventKind::Error => {
                source.error = clone.error.clone();
                event.retarget(source.target());
                source.emit(event);
            }
            _ => {
                event.retarget(source.target());
                source.emit(event);
            }
        }
    } else if source.aborted {
        // The source died while this clone was in flight; take the clone
        // down with it. Sampling clones have no listeners, so this cannot
        // re-enter the bridge.
        clone.abort();
    }
}

/// Run one clone through its cycles, bridging its events to the source.
fn execute_clone(ctx: &mut SampleCtx<'_>, clone: &mut Benchmark) {
    let timer = ctx.timer.clone();
    let min_time = ctx.bench.resolved_min_time(&timer);
    let source = &mut *ctx.bench;
    let mut bridge = |clone: &mut Benchmark, event: &mut Event| forward(source, clone, event);

    clone.running = true;
    clone.count = clone.options.init_count;
    clone.times.time_stamp = timer.now();
    let mut start = clone.new_event(EventKind::Start);
    bridge(clone, &mut start);
    if start.cancelled {
        clone.running = false;
        return;
    }
    run_cycles(clone, &timer, min_time, Some(&mut bridge));
}

/// Fold one finished clone into the source's sample and decide whether the
/// run goes on.
fn evaluate(
    ctx: &mut SampleCtx<'_>,
    queue: &mut VecDeque<Benchmark>,
    clone: &mut Benchmark,
    event: &mut Event,
) {
    let now = ctx.timer.now();
    let bench = &mut *ctx.bench;
    let mut done = bench.aborted || bench.error.is_some();

    // Mirror the clone's externally visible counters onto the source.
    bench.count = clone.count;
    bench.cycles = bench.cycles.wrapping_add(clone.cycles);

    bench.stats.push(clone.times.period);
    ctx.elapsed += now - clone.times.time_stamp;
    let mut maxed_out = bench.stats.sample.len() >= bench.options.min_samples
        && ctx.elapsed > bench.options.max_time;

    // An aborted or unclockable run contributes nothing.
    if done || clone.hz.is_infinite() {
        maxed_out = true;
        bench.stats.clear();
        queue.clear();
    }

    if bench.running {
        if maxed_out {
            bench.options.init_count = ctx.saved_init_count;
            bench.running = false;
            done = true;
            bench.times.elapsed = now - ctx.initial;
        } else {
            // Seed the next clone with the discovered per-cycle count so it
            // skips the growth phase.
            bench.options.init_count = clone.count.max(1);
        }
        if !bench.stats.sample.is_empty() {
            let mean = bench.stats.mean;
            if mean > 0.0 {
                bench.hz = 1.0 / mean;
                bench.times.cycle = mean * bench.count as f64;
                bench.times.period = mean;
            }
        }
    }

    if queue.len() < 2 && !maxed_out {
        queue.push_back(bench.clone_for_sampling());
    }
    event.aborted = done;
}

/// Measure `bench` until its statistics are trustworthy or its budget is
/// spent, then emit `complete`.
pub(crate) fn run_sampling(bench: &mut Benchmark, timer: &Timer) {
    let saved_init_count = bench.options.init_count;
    bench.stats.clear();
    let initial = timer.now();
    bench.times = Times {
        time_stamp: initial,
        ..Times::default()
    };

    let mut queue = VecDeque::new();
    queue.push_back(bench.clone_for_sampling());

    let mut ctx = SampleCtx {
        bench,
        timer: timer.clone(),
        elapsed: 0.0,
        initial,
        saved_init_count,
    };
    {
        let mut execute =
            |ctx: &mut SampleCtx<'_>, clone: &mut Benchmark| execute_clone(ctx, clone);
        let mut on_cycle = |ctx: &mut SampleCtx<'_>,
                            queue: &mut VecDeque<Benchmark>,
                            clone: &mut Benchmark,
                            event: &mut Event| evaluate(ctx, queue, clone, event);
        invoke_queue(
            &mut queue,
            &mut ctx,
            &mut execute,
            &mut QueueHooks {
                on_start: None,
                on_cycle: Some(&mut on_cycle),
                on_complete: None,
            },
        );
    }

    let bench = ctx.bench;
    bench.running = false;
    let mut complete = bench.new_event(EventKind::Complete);
    bench.emit(&mut complete);
}
