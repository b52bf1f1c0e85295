//! An operation the timer cannot see terminates with `UnclockableRate`.

use microbench::{BenchError, Benchmark, TimeSource, Timer};

/// A clock that never advances: every batch registers zero elapsed time.
struct FrozenSource;

impl TimeSource for FrozenSource {
    fn name(&self) -> &'static str {
        "frozen"
    }
    fn now(&self) -> f64 {
        7.0
    }
}

#[test]
fn frozen_timer_aborts_after_the_escalation_schedule() {
    let mut bench = Benchmark::new("immeasurable", || {})
        .with_timer(Timer::with_source(FrozenSource, 1e-9))
        .min_time(0.05)
        .max_time(1.0);
    bench.run();

    assert_eq!(bench.error, Some(BenchError::UnclockableRate));
    assert!(bench.aborted);
    assert!(!bench.running);
    assert_eq!(bench.stats.sample.len(), 0);
}

/// The escalation schedule walks exactly five cycles before giving up.
#[test]
fn frozen_timer_runs_five_cycles() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let cycles = Rc::new(RefCell::new(0u32));
    let seen = Rc::clone(&cycles);
    let mut bench = Benchmark::new("five", || {})
        .with_timer(Timer::with_source(FrozenSource, 1e-9))
        .min_time(0.05)
        .max_time(1.0)
        .on_cycle(move |_| *seen.borrow_mut() += 1);
    bench.run();

    assert_eq!(bench.error, Some(BenchError::UnclockableRate));
    // Five clocked cycles plus the synthetic cycle emitted by the abort.
    assert_eq!(*cycles.borrow(), 6);
}
