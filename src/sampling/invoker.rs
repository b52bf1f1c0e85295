//! Drive a list of benchmarks through an operation.
//!
//! Two traversal modes: *map* walks a fixed slice in order, *queue* pops the
//! head until the queue is empty (the sampling controller's mode; hooks may
//! refill or drain the queue while it runs). Hooks fire `start` once before
//! the first benchmark, `cycle` after each one, and `complete` once at the
//! end. A hook that sets `aborted` on its cycle event stops the traversal.
//!
//! Async and deferred benchmarks are paced: when another benchmark follows,
//! the invoker sleeps the finished benchmark's `delay` before moving on.

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use crate::benchmark::Benchmark;
use crate::event::{Event, EventKind};

/// Hooks observing a queue-mode invocation. All hooks share the caller's
/// context; the cycle hook additionally sees the live queue so it can refill
/// or drain it.
pub(crate) struct QueueHooks<'h, C> {
    pub on_start: Option<&'h mut dyn FnMut(&mut C, &mut Benchmark, &mut Event)>,
    pub on_cycle: Option<&'h mut dyn FnMut(&mut C, &mut VecDeque<Benchmark>, &mut Benchmark, &mut Event)>,
    pub on_complete: Option<&'h mut dyn FnMut(&mut C)>,
}

impl<C> Default for QueueHooks<'_, C> {
    fn default() -> Self {
        Self {
            on_start: None,
            on_cycle: None,
            on_complete: None,
        }
    }
}

/// Hooks observing a map-mode invocation.
pub(crate) struct MapHooks<'h, C> {
    pub on_start: Option<&'h mut dyn FnMut(&mut C, &mut Benchmark, &mut Event)>,
    pub on_cycle: Option<&'h mut dyn FnMut(&mut C, &mut Benchmark, &mut Event)>,
    pub on_complete: Option<&'h mut dyn FnMut(&mut C)>,
}

impl<C> Default for MapHooks<'_, C> {
    fn default() -> Self {
        Self {
            on_start: None,
            on_cycle: None,
            on_complete: None,
        }
    }
}

/// Whether to pause between this benchmark and the next.
fn paced(bench: &Benchmark) -> Option<Duration> {
    if (bench.options.run_async || bench.options.defer) && bench.options.delay > 0.0 {
        Some(Duration::from_secs_f64(bench.options.delay))
    } else {
        None
    }
}

/// Queue mode: pop and run until the queue is empty or a cycle hook aborts.
/// Finished benchmarks are consumed.
pub(crate) fn invoke_queue<C>(
    queue: &mut VecDeque<Benchmark>,
    ctx: &mut C,
    execute: &mut dyn FnMut(&mut C, &mut Benchmark),
    hooks: &mut QueueHooks<'_, C>,
) {
    let mut started = false;
    while let Some(mut bench) = queue.pop_front() {
        if !started {
            started = true;
            if let Some(on_start) = hooks.on_start.as_mut() {
                let mut event = bench.new_event(EventKind::Start);
                on_start(ctx, &mut bench, &mut event);
            }
        }
        execute(ctx, &mut bench);

        let mut event = bench.new_event(EventKind::Cycle);
        if let Some(on_cycle) = hooks.on_cycle.as_mut() {
            on_cycle(ctx, queue, &mut bench, &mut event);
        }
        if event.aborted {
            queue.clear();
            break;
        }
        if !queue.is_empty() {
            if let Some(pause) = paced(&bench) {
                thread::sleep(pause);
            }
        }
    }
    if let Some(on_complete) = hooks.on_complete.as_mut() {
        on_complete(ctx);
    }
}

/// Map mode: walk the slice in order, leaving the benchmarks in place.
pub(crate) fn invoke_map<C>(
    benches: &mut [Benchmark],
    ctx: &mut C,
    execute: &mut dyn FnMut(&mut C, &mut Benchmark),
    hooks: &mut MapHooks<'_, C>,
) {
    let len = benches.len();
    for (index, bench) in benches.iter_mut().enumerate() {
        if index == 0 {
            if let Some(on_start) = hooks.on_start.as_mut() {
                let mut event = bench.new_event(EventKind::Start);
                on_start(ctx, bench, &mut event);
            }
        }
        execute(ctx, bench);

        let mut event = bench.new_event(EventKind::Cycle);
        if let Some(on_cycle) = hooks.on_cycle.as_mut() {
            on_cycle(ctx, bench, &mut event);
        }
        if event.aborted {
            break;
        }
        if index + 1 < len {
            if let Some(pause) = paced(bench) {
                thread::sleep(pause);
            }
        }
    }
    if let Some(on_complete) = hooks.on_complete.as_mut() {
        on_complete(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(names: &[&str]) -> VecDeque<Benchmark> {
        names.iter().map(|n| Benchmark::named(*n)).collect()
    }

    #[test]
    fn queue_mode_runs_in_order_and_consumes() {
        let mut queue = named(&["a", "b", "c"]);
        let mut seen: Vec<String> = Vec::new();
        invoke_queue(
            &mut queue,
            &mut seen,
            &mut |seen, bench| seen.push(bench.name.clone()),
            &mut QueueHooks::default(),
        );
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn queue_hooks_fire_start_once_and_complete_once() {
        let mut queue = named(&["a", "b"]);
        let mut counts = (0u32, 0u32, 0u32);
        let mut on_start = |c: &mut (u32, u32, u32), _: &mut Benchmark, _: &mut Event| c.0 += 1;
        let mut on_cycle = |c: &mut (u32, u32, u32),
                            _: &mut VecDeque<Benchmark>,
                            _: &mut Benchmark,
                            _: &mut Event| c.1 += 1;
        let mut on_complete = |c: &mut (u32, u32, u32)| c.2 += 1;
        invoke_queue(
            &mut queue,
            &mut counts,
            &mut |_, _| {},
            &mut QueueHooks {
                on_start: Some(&mut on_start),
                on_cycle: Some(&mut on_cycle),
                on_complete: Some(&mut on_complete),
            },
        );
        assert_eq!(counts, (1, 2, 1));
    }

    #[test]
    fn aborting_cycle_hook_drains_the_queue() {
        let mut queue = named(&["a", "b", "c"]);
        let mut ran = 0u32;
        let mut on_cycle = |_: &mut u32,
                            _: &mut VecDeque<Benchmark>,
                            _: &mut Benchmark,
                            ev: &mut Event| ev.aborted = true;
        invoke_queue(
            &mut queue,
            &mut ran,
            &mut |ran, _| *ran += 1,
            &mut QueueHooks {
                on_start: None,
                on_cycle: Some(&mut on_cycle),
                on_complete: None,
            },
        );
        assert_eq!(ran, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn cycle_hook_can_refill_the_queue() {
        let mut queue = named(&["seed"]);
        let mut ran = 0u32;
        let mut on_cycle = |ran: &mut u32,
                            queue: &mut VecDeque<Benchmark>,
                            _: &mut Benchmark,
                            _: &mut Event| {
            if *ran < 4 {
                queue.push_back(Benchmark::named("more"));
            }
        };
        invoke_queue(
            &mut queue,
            &mut ran,
            &mut |ran, _| *ran += 1,
            &mut QueueHooks {
                on_start: None,
                on_cycle: Some(&mut on_cycle),
                on_complete: None,
            },
        );
        assert_eq!(ran, 5);
    }

    #[test]
    fn map_mode_leaves_benchmarks_in_place() {
        let mut benches: Vec<Benchmark> = vec![Benchmark::named("x"), Benchmark::named("y")];
        let mut seen: Vec<String> = Vec::new();
        invoke_map(
            &mut benches,
            &mut seen,
            &mut |seen, bench| seen.push(bench.name.clone()),
            &mut MapHooks::default(),
        );
        assert_eq!(seen, vec!["x", "y"]);
        assert_eq!(benches.len(), 2);
    }

    #[test]
    fn map_mode_stops_on_abort() {
        let mut benches: Vec<Benchmark> =
            vec![Benchmark::named("x"), Benchmark::named("y"), Benchmark::named("z")];
        let mut ran = 0u32;
        let mut on_cycle = |ran: &mut u32, _: &mut Benchmark, ev: &mut Event| {
            if *ran >= 2 {
                ev.aborted = true;
            }
        };
        invoke_map(
            &mut benches,
            &mut ran,
            &mut |ran, _| *ran += 1,
            &mut MapHooks {
                on_start: None,
                on_cycle: Some(&mut on_cycle),
                on_complete: None,
            },
        );
        assert_eq!(ran, 2);
    }
}
