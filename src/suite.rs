//! A named collection of benchmarks run as a unit.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::benchmark::Benchmark;
use crate::event::{Event, EventKind, EventTarget, Listeners};
use crate::sampling::invoker::{invoke_map, invoke_queue, MapHooks, QueueHooks};

static NEXT_SUITE_ID: AtomicU64 = AtomicU64::new(1);

/// Options for [`Suite::run_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SuiteRunOptions {
    /// Treat the suite as a work queue: benchmarks are consumed as they
    /// finish instead of being walked in place.
    pub queued: bool,
}

/// An ordered collection of benchmarks with its own listener registry.
///
/// Suite-level `start`, `cycle`, and `complete` events fire around the
/// contained benchmarks; `target` identifies the benchmark the event is
/// about and `current_target` the suite. A listener that sets `aborted` on
/// a `cycle` event stops the run.
pub struct Suite {
    /// Display name.
    pub name: String,
    /// Process-unique id.
    pub id: u64,
    /// Whether a run is in flight.
    pub running: bool,
    /// Whether the last run was aborted.
    pub aborted: bool,
    benches: Vec<Benchmark>,
    listeners: Listeners,
}

/// Context shared with the invoker hooks during a suite run.
struct SuiteCtx<'a> {
    listeners: &'a Listeners,
    suite_target: EventTarget,
    aborted: bool,
}

impl SuiteCtx<'_> {
    fn emit(&mut self, mut event: Event) {
        event.current_target = self.suite_target.clone();
        self.listeners.emit(&mut event);
        if event.aborted {
            self.aborted = true;
        }
    }
}

impl Suite {
    /// Empty suite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: NEXT_SUITE_ID.fetch_add(1, Ordering::Relaxed),
            running: false,
            aborted: false,
            benches: Vec::new(),
            listeners: Listeners::default(),
        }
    }

    fn target(&self) -> EventTarget {
        EventTarget {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// Add a benchmark, announcing it through a cancellable `add` event.
    pub fn add(&mut self, bench: Benchmark) -> &mut Self {
        let mut event = Event::new(EventKind::Add, bench.target());
        event.current_target = self.target();
        self.listeners.emit(&mut event);
        if !event.cancelled {
            self.benches.push(bench);
        }
        self
    }

    /// Construct and add a benchmark in one step.
    pub fn add_fn<F: Fn() + 'static>(&mut self, name: impl Into<String>, body: F) -> &mut Self {
        self.add(Benchmark::new(name, body))
    }

    /// Run every benchmark in order.
    pub fn run(&mut self) -> &mut Self {
        self.run_with(SuiteRunOptions::default())
    }

    /// Run with explicit options.
    pub fn run_with(&mut self, options: SuiteRunOptions) -> &mut Self {
        if self.running {
            return self;
        }
        self.running = true;
        self.aborted = false;
        let suite_target = self.target();

        let aborted = {
            let Suite {
                benches, listeners, ..
            } = self;
            let mut ctx = SuiteCtx {
                listeners,
                suite_target,
                aborted: false,
            };

            let mut execute = |_: &mut SuiteCtx<'_>, bench: &mut Benchmark| {
                bench.run();
            };
            let mut on_start = |ctx: &mut SuiteCtx<'_>, bench: &mut Benchmark, _: &mut Event| {
                ctx.emit(Event::new(EventKind::Start, bench.target()));
            };
            let mut on_complete = |ctx: &mut SuiteCtx<'_>| {
                let target = ctx.suite_target.clone();
                ctx.emit(Event::new(EventKind::Complete, target));
            };

            if options.queued {
                let mut queue: VecDeque<Benchmark> = benches.drain(..).collect();
                let mut on_cycle = |ctx: &mut SuiteCtx<'_>,
                                    _: &mut VecDeque<Benchmark>,
                                    bench: &mut Benchmark,
                                    event: &mut Event| {
                    ctx.emit(Event::new(EventKind::Cycle, bench.target()));
                    if ctx.aborted {
                        event.aborted = true;
                    }
                };
                invoke_queue(
                    &mut queue,
                    &mut ctx,
                    &mut execute,
                    &mut QueueHooks {
                        on_start: Some(&mut on_start),
                        on_cycle: Some(&mut on_cycle),
                        on_complete: Some(&mut on_complete),
                    },
                );
            } else {
                let mut on_cycle =
                    |ctx: &mut SuiteCtx<'_>, bench: &mut Benchmark, event: &mut Event| {
                        ctx.emit(Event::new(EventKind::Cycle, bench.target()));
                        if ctx.aborted {
                            event.aborted = true;
                        }
                    };
                invoke_map(
                    benches,
                    &mut ctx,
                    &mut execute,
                    &mut MapHooks {
                        on_start: Some(&mut on_start),
                        on_cycle: Some(&mut on_cycle),
                        on_complete: Some(&mut on_complete),
                    },
                );
            }
            ctx.aborted
        };

        self.aborted = aborted;
        self.running = false;
        self
    }

    /// Abort: stops a run at the next benchmark boundary and marks the
    /// suite aborted.
    pub fn abort(&mut self) -> &mut Self {
        let mut event = Event::new(EventKind::Abort, self.target());
        self.listeners.emit(&mut event);
        if !event.cancelled {
            self.aborted = true;
            self.running = false;
        }
        self
    }

    /// Reset the suite and every contained benchmark.
    pub fn reset(&mut self) -> &mut Self {
        for bench in &mut self.benches {
            bench.reset();
        }
        self.aborted = false;
        let mut event = Event::new(EventKind::Reset, self.target());
        self.listeners.emit(&mut event);
        self
    }

    /// Register a suite-level listener.
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> &mut Self
    where
        F: FnMut(&mut Event) + 'static,
    {
        self.listeners.on(kind, listener);
        self
    }

    /// Remove every suite-level listener for `kind`.
    pub fn off(&mut self, kind: EventKind) -> &mut Self {
        self.listeners.off(kind);
        self
    }

    /// Benchmarks that finished without error.
    pub fn successful(&self) -> Vec<&Benchmark> {
        self.benches
            .iter()
            .filter(|b| b.error.is_none() && !b.aborted && b.cycles > 0)
            .collect()
    }

    /// Successful benchmarks none of which is beaten by another.
    pub fn fastest(&self) -> Vec<&Benchmark> {
        let pool = self.successful();
        pool.iter()
            .filter(|a| pool.iter().all(|b| a.compare(b) != -1))
            .copied()
            .collect()
    }

    /// Successful benchmarks that beat none of the others.
    pub fn slowest(&self) -> Vec<&Benchmark> {
        let pool = self.successful();
        pool.iter()
            .filter(|a| pool.iter().all(|b| a.compare(b) != 1))
            .copied()
            .collect()
    }

    /// Number of benchmarks in the suite.
    pub fn len(&self) -> usize {
        self.benches.len()
    }

    /// Whether the suite holds no benchmarks.
    pub fn is_empty(&self) -> bool {
        self.benches.is_empty()
    }

    /// The benchmark at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Benchmark> {
        self.benches.get(index)
    }

    /// Iterate over the contained benchmarks.
    pub fn iter(&self) -> std::slice::Iter<'_, Benchmark> {
        self.benches.iter()
    }
}

impl std::fmt::Debug for Suite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("benches", &self.benches.len())
            .field("running", &self.running)
            .field("aborted", &self.aborted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn add_appends_in_order() {
        let mut suite = Suite::new("s");
        suite.add_fn("a", || {}).add_fn("b", || {});
        assert_eq!(suite.len(), 2);
        assert_eq!(suite.get(0).unwrap().name, "a");
        assert_eq!(suite.get(1).unwrap().name, "b");
    }

    #[test]
    fn cancelled_add_event_rejects_the_benchmark() {
        let mut suite = Suite::new("s");
        suite.on(EventKind::Add, |ev| ev.cancelled = true);
        suite.add(Benchmark::named("rejected"));
        assert!(suite.is_empty());
    }

    #[test]
    fn add_event_sees_the_benchmark_as_target() {
        let names = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&names);
        let mut suite = Suite::new("s");
        suite.on(EventKind::Add, move |ev| {
            seen.borrow_mut().push(ev.target.name.clone());
        });
        suite.add(Benchmark::named("x"));
        assert_eq!(*names.borrow(), vec!["x"]);
    }

    #[test]
    fn fastest_and_slowest_partition_by_sample() {
        let mut suite = Suite::new("s");
        let mut fast = Benchmark::named("fast");
        let mut slow = Benchmark::named("slow");
        for x in [0.01, 0.011, 0.012, 0.010, 0.011] {
            fast.stats.push(x);
        }
        for x in [0.02, 0.021, 0.019, 0.020, 0.022] {
            slow.stats.push(x);
        }
        fast.cycles = 1;
        slow.cycles = 1;
        suite.add(fast);
        suite.add(slow);
        let fastest = suite.fastest();
        assert_eq!(fastest.len(), 1);
        assert_eq!(fastest[0].name, "fast");
        let slowest = suite.slowest();
        assert_eq!(slowest.len(), 1);
        assert_eq!(slowest[0].name, "slow");
    }

    #[test]
    fn successful_excludes_errored_and_unrun() {
        let mut suite = Suite::new("s");
        let mut ok = Benchmark::named("ok");
        ok.cycles = 2;
        let mut bad = Benchmark::named("bad");
        bad.cycles = 2;
        bad.error = Some(crate::error::BenchError::EmptyBody);
        let unrun = Benchmark::named("unrun");
        suite.add(ok);
        suite.add(bad);
        suite.add(unrun);
        let ok_names: Vec<_> = suite.successful().iter().map(|b| b.name.clone()).collect();
        assert_eq!(ok_names, vec!["ok"]);
    }

    #[test]
    fn suite_abort_event_is_cancellable() {
        let mut suite = Suite::new("s");
        suite.on(EventKind::Abort, |ev| ev.cancelled = true);
        suite.abort();
        assert!(!suite.aborted);
    }

    #[test]
    fn queued_run_consumes_the_benchmarks() {
        let mut suite = Suite::new("q");
        suite.add(Benchmark::named("a"));
        suite.add(Benchmark::named("b"));
        suite.run_with(SuiteRunOptions { queued: true });
        assert!(suite.is_empty());
        assert!(!suite.running);
    }

    #[test]
    fn failed_benchmark_does_not_stop_the_queue() {
        let cycles = Rc::new(RefCell::new(0u32));
        let seen = Rc::clone(&cycles);
        let mut suite = Suite::new("q");
        suite.on(EventKind::Cycle, move |_| *seen.borrow_mut() += 1);
        // Both are bodiless and fail with EmptyBody; the queue still visits
        // each of them.
        suite.add(Benchmark::named("a"));
        suite.add(Benchmark::named("b"));
        suite.run_with(SuiteRunOptions { queued: true });
        assert_eq!(*cycles.borrow(), 2);
    }
}
