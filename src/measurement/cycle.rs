//! The cycle controller: drive one benchmark through repeated clock batches
//! until a batch runs long enough to be a trustworthy measurement.
//!
//! Each cycle clocks a batch, derives `period` and `hz`, and either accepts
//! the measurement (`elapsed >= min_time`) or grows the iteration count and
//! goes again. A batch that registers no elapsed time at all escalates the
//! count through a fixed divisor schedule; if the schedule runs out the
//! operation is unclockable. The loop is an explicit state machine and
//! yields to the host only at the inter-cycle delay in async mode.

use std::thread;
use std::time::Duration;

use crate::benchmark::Benchmark;
use crate::constants::{zero_elapsed_divisor, ZERO_ELAPSED_TARGET};
use crate::error::BenchError;
use crate::event::{Event, EventKind};
use crate::measurement::clock;
use crate::measurement::timer::Timer;

/// Callback translating a clone's events to its source benchmark.
///
/// Installed by the sampling controller; `None` dispatches to the
/// benchmark's own listeners.
pub(crate) type Bridge<'a> = &'a mut dyn FnMut(&mut Benchmark, &mut Event);

/// States of one measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleState {
    Clocking,
    Evaluating,
    Scheduling,
    Done,
}

/// Dispatch an event through the bridge when present, otherwise to the
/// benchmark's own listeners.
pub(crate) fn dispatch(bench: &mut Benchmark, event: &mut Event, bridge: &mut Option<Bridge<'_>>) {
    match bridge {
        Some(bridge) => bridge(bench, event),
        None => bench.emit(event),
    }
}

/// Stop a benchmark from inside the cycle loop.
///
/// Bridged clones announce the abort through the bridge (which aborts the
/// source) and then tear their own state down directly; a standalone
/// benchmark goes through its public `abort`.
fn abort_in_cycle(bench: &mut Benchmark, bridge: &mut Option<Bridge<'_>>) {
    if bridge.is_some() {
        let mut event = bench.new_event(EventKind::Abort);
        dispatch(bench, &mut event, bridge);
        bench.teardown_after_abort();
    } else {
        bench.abort();
    }
}

/// Run measurement cycles until one is definitive, the benchmark errors, or
/// a listener aborts. On return the benchmark is no longer running and its
/// `complete` event has fired.
pub(crate) fn run_cycles(
    bench: &mut Benchmark,
    timer: &Timer,
    min_time: f64,
    mut bridge: Option<Bridge<'_>>,
) {
    let mut clocked = 0.0;
    let mut next_count = bench.count;
    let mut state = CycleState::Clocking;

    loop {
        match state {
            CycleState::Clocking => {
                clocked = clock::clock(bench, timer);
                bench.cycles += 1;
                state = CycleState::Evaluating;
            }
            CycleState::Evaluating => {
                let mut definitive = false;
                if bench.error.is_none() {
                    bench.times.cycle = clocked;
                    let period = clocked / bench.count as f64;
                    bench.times.period = period;
                    bench.hz = 1.0 / period;

                    if clocked >= min_time {
                        definitive = true;
                    } else {
                        let grown = if clocked == 0.0 {
                            match zero_elapsed_divisor(bench.cycles) {
                                Some(divisor) => (ZERO_ELAPSED_TARGET / divisor).floor(),
                                None => f64::INFINITY,
                            }
                        } else {
                            bench.count as f64 + ((min_time - clocked) / period).ceil()
                        };
                        if grown.is_finite() {
                            next_count = grown as u64;
                        } else {
                            // The schedule is exhausted: this operation sits
                            // below the timer's resolution no matter how far
                            // the count is grown.
                            bench.error = Some(BenchError::UnclockableRate);
                        }
                    }
                }

                let mut event = bench.new_event(EventKind::Cycle);
                dispatch(bench, &mut event, &mut bridge);

                if bench.error.is_some() {
                    let mut error_event = bench.new_event(EventKind::Error);
                    dispatch(bench, &mut error_event, &mut bridge);
                    if !error_event.cancelled {
                        abort_in_cycle(bench, &mut bridge);
                    }
                    state = CycleState::Done;
                } else if event.aborted {
                    abort_in_cycle(bench, &mut bridge);
                    state = CycleState::Done;
                } else if definitive || !bench.running {
                    state = CycleState::Done;
                } else {
                    state = CycleState::Scheduling;
                }
            }
            CycleState::Scheduling => {
                bench.count = next_count;
                if bench.options.run_async && bench.options.delay > 0.0 {
                    let before = timer.now();
                    thread::sleep(Duration::from_secs_f64(bench.options.delay));
                    // Delays never count toward the sampling budget; slide
                    // the run's start stamp past the pause.
                    bench.times.time_stamp += timer.now() - before;
                }
                state = CycleState::Clocking;
            }
            CycleState::Done => {
                bench.running = false;
                let mut event = bench.new_event(EventKind::Complete);
                bench.emit(&mut event);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::timer::{InstantSource, TimeSource};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// A clock that never advances, so every batch registers zero elapsed.
    struct FrozenSource;

    impl TimeSource for FrozenSource {
        fn name(&self) -> &'static str {
            "frozen"
        }
        fn now(&self) -> f64 {
            1.0
        }
    }

    fn fine_timer() -> Timer {
        Timer::with_source(InstantSource, 1e-9)
    }

    #[test]
    fn definitive_cycle_satisfies_min_time() {
        let mut bench = Benchmark::new("spin", || {
            let mut x = 0u64;
            for i in 0..100 {
                x = x.wrapping_add(crate::measurement::timer::black_box(i));
            }
            crate::measurement::timer::black_box(x);
        });
        bench.running = true;
        bench.count = bench.options.init_count;
        let timer = fine_timer();
        run_cycles(&mut bench, &timer, 0.01, None);
        assert!(bench.error.is_none());
        assert!(!bench.running);
        assert!(bench.times.cycle >= 0.01);
        assert!(bench.hz.is_finite());
        assert!((bench.hz * bench.times.period - 1.0).abs() < 1e-9);
    }

    #[test]
    fn count_grows_monotonically() {
        let counts = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&counts);
        let mut bench = Benchmark::new("grow", || {
            crate::measurement::timer::black_box(12u8);
        })
        .on_cycle(move |event| {
            if let Some(report) = &event.result {
                seen.borrow_mut().push(report.count);
            }
        });
        bench.running = true;
        bench.count = 1;
        let timer = fine_timer();
        run_cycles(&mut bench, &timer, 0.01, None);
        let counts = counts.borrow();
        assert!(counts.len() >= 2, "expected several cycles, got {counts:?}");
        for pair in counts.windows(2) {
            assert!(pair[0] <= pair[1], "count shrank: {counts:?}");
        }
    }

    #[test]
    fn frozen_clock_exhausts_the_divisor_schedule() {
        let cycles_seen = Rc::new(RefCell::new(0u64));
        let seen = Rc::clone(&cycles_seen);
        let mut bench = Benchmark::new("frozen", || {})
            .on_cycle(move |_| *seen.borrow_mut() += 1)
            .with_timer(Timer::with_source(FrozenSource, 1e-9));
        bench.running = true;
        bench.count = 1;
        let timer = Timer::with_source(FrozenSource, 1e-9);
        run_cycles(&mut bench, &timer, 0.05, None);
        assert_eq!(bench.error, Some(BenchError::UnclockableRate));
        assert_eq!(*cycles_seen.borrow(), 5);
        assert!(bench.aborted);
        assert!(!bench.running);
    }

    #[test]
    fn listener_abort_stops_the_loop() {
        let mut bench = Benchmark::new("stop-me", || {
            crate::measurement::timer::black_box(7u8);
        })
        .on_cycle(|event| event.aborted = true);
        bench.running = true;
        bench.count = 1;
        let timer = fine_timer();
        run_cycles(&mut bench, &timer, 10.0, None);
        assert!(bench.aborted);
        assert!(!bench.running);
        assert!(bench.error.is_none());
    }

    #[test]
    fn complete_fires_exactly_once() {
        let completions = Rc::new(RefCell::new(0u32));
        let seen = Rc::clone(&completions);
        let mut bench = Benchmark::new("complete", || {
            crate::measurement::timer::black_box(1u8);
        })
        .on_complete(move |_| *seen.borrow_mut() += 1);
        bench.running = true;
        bench.count = 1;
        let timer = fine_timer();
        run_cycles(&mut bench, &timer, 0.005, None);
        assert_eq!(*completions.borrow(), 1);
    }
}
