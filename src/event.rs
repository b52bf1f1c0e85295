//! Event envelopes and the listener registry.
//!
//! Every boundary of a benchmark's lifecycle is announced through an
//! [`Event`] passed to registered listeners. Listeners run in registration
//! order and communicate back through two flags on the event: `aborted`
//! short-circuits the remaining listeners and asks the emitter to stop
//! iterating, `cancelled` vetoes the emitter's default action.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// The lifecycle boundaries a listener can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// A run is beginning. Fires at most once per `run`.
    Start,
    /// A clock batch completed, or an invoker moved between benchmarks.
    Cycle,
    /// An error was recorded on the benchmark.
    Error,
    /// The benchmark was aborted.
    Abort,
    /// The benchmark is being restored to its initial state.
    Reset,
    /// The run finished, successfully or not. Fires exactly once per run.
    Complete,
    /// A benchmark was added to a suite.
    Add,
}

/// Identity of the object an event refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTarget {
    /// Process-unique id of the benchmark or suite.
    pub id: u64,
    /// Its display name.
    pub name: String,
}

/// Snapshot of a benchmark's externally visible numbers, attached to events
/// so listeners can report progress without reaching back into the emitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Iterations per cycle at the time of the event.
    pub count: u64,
    /// Cycles completed so far.
    pub cycles: u64,
    /// Operations per second.
    pub hz: f64,
    /// Seconds per operation.
    pub period: f64,
    /// Seconds the most recent clock batch took.
    pub elapsed: f64,
    /// Samples gathered so far.
    pub sample_len: usize,
    /// Mean of the gathered samples.
    pub mean: f64,
    /// Relative margin of error, percent.
    pub rme: f64,
}

/// Immutable envelope handed to listeners.
///
/// `target` is the benchmark the event originated on; `current_target` is the
/// object whose listener list is being walked. The sampling controller
/// rewrites `target` when it re-emits a clone's event on the source.
#[derive(Debug, Clone)]
pub struct Event {
    /// Which boundary fired.
    pub kind: EventKind,
    /// Originating benchmark or suite.
    pub target: EventTarget,
    /// Object currently dispatching the event.
    pub current_target: EventTarget,
    /// Wall-clock seconds since the Unix epoch when the event was created.
    pub time_stamp: f64,
    /// Set by a listener to short-circuit remaining listeners and stop the
    /// emitter's iteration at the next boundary.
    pub aborted: bool,
    /// Set by a listener to veto the emitter's default action.
    pub cancelled: bool,
    /// Human-readable detail, populated for error events.
    pub message: Option<String>,
    /// Progress snapshot, populated for benchmark-level events.
    pub result: Option<CycleReport>,
    /// The error recorded on the target, if any.
    pub error: Option<BenchError>,
}

impl Event {
    /// Create an event for the given target.
    pub fn new(kind: EventKind, target: EventTarget) -> Self {
        Self {
            kind,
            current_target: target.clone(),
            target,
            time_stamp: wall_now(),
            aborted: false,
            cancelled: false,
            message: None,
            result: None,
            error: None,
        }
    }

    /// Rewrite `target` and `current_target`, used when re-emitting a
    /// clone's event on its source.
    pub fn retarget(&mut self, target: EventTarget) {
        self.current_target = target.clone();
        self.target = target;
    }
}

/// Wall-clock seconds since the Unix epoch.
pub(crate) fn wall_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

type ListenerFn = dyn FnMut(&mut Event);

/// A registered listener, shared so clones of a benchmark observe the same
/// callbacks as their original.
pub(crate) type Listener = Rc<RefCell<ListenerFn>>;

/// Ordered listener registry keyed by event kind.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
    map: HashMap<EventKind, Vec<Listener>>,
}

impl Listeners {
    /// Append a listener for `kind`.
    pub fn on<F>(&mut self, kind: EventKind, listener: F)
    where
        F: FnMut(&mut Event) + 'static,
    {
        self.map
            .entry(kind)
            .or_default()
            .push(Rc::new(RefCell::new(listener)));
    }

    /// Remove every listener registered for `kind`.
    pub fn off(&mut self, kind: EventKind) {
        self.map.remove(&kind);
    }

    /// Remove all listeners of every kind.
    pub fn off_all(&mut self) {
        self.map.clear();
    }

    /// Number of listeners registered for `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.map.get(&kind).map_or(0, Vec::len)
    }

    /// Dispatch `event` to the listeners registered for its kind, in
    /// registration order. A listener that sets `event.aborted` stops the
    /// walk; listeners registered later never see the event.
    pub fn emit(&self, event: &mut Event) {
        let Some(list) = self.map.get(&event.kind) else {
            return;
        };
        // Snapshot so a listener dropping the registry's owner cannot
        // invalidate the walk.
        let snapshot: Vec<Listener> = list.clone();
        for listener in snapshot {
            (&mut *listener.borrow_mut())(event);
            if event.aborted {
                break;
            }
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<(EventKind, usize)> =
            self.map.iter().map(|(k, v)| (*k, v.len())).collect();
        counts.sort_by_key(|(k, _)| format!("{k:?}"));
        f.debug_struct("Listeners").field("counts", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> EventTarget {
        EventTarget {
            id: 1,
            name: "t".into(),
        }
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::default();
        for i in 0..3 {
            let order = Rc::clone(&order);
            listeners.on(EventKind::Cycle, move |_| order.borrow_mut().push(i));
        }
        let mut ev = Event::new(EventKind::Cycle, target());
        listeners.emit(&mut ev);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn aborted_short_circuits_remaining_listeners() {
        let hits = Rc::new(RefCell::new(0));
        let mut listeners = Listeners::default();
        listeners.on(EventKind::Cycle, |ev| ev.aborted = true);
        {
            let hits = Rc::clone(&hits);
            listeners.on(EventKind::Cycle, move |_| *hits.borrow_mut() += 1);
        }
        let mut ev = Event::new(EventKind::Cycle, target());
        listeners.emit(&mut ev);
        assert!(ev.aborted);
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn off_removes_listeners_of_a_kind() {
        let mut listeners = Listeners::default();
        listeners.on(EventKind::Start, |_| {});
        listeners.on(EventKind::Cycle, |_| {});
        assert_eq!(listeners.count(EventKind::Start), 1);
        listeners.off(EventKind::Start);
        assert_eq!(listeners.count(EventKind::Start), 0);
        assert_eq!(listeners.count(EventKind::Cycle), 1);
    }

    #[test]
    fn retarget_rewrites_both_fields() {
        let mut ev = Event::new(EventKind::Cycle, target());
        let other = EventTarget {
            id: 9,
            name: "other".into(),
        };
        ev.retarget(other.clone());
        assert_eq!(ev.target, other);
        assert_eq!(ev.current_target, other);
    }

    #[test]
    fn cancelled_is_listener_controlled() {
        let mut listeners = Listeners::default();
        listeners.on(EventKind::Reset, |ev| ev.cancelled = true);
        let mut ev = Event::new(EventKind::Reset, target());
        listeners.emit(&mut ev);
        assert!(ev.cancelled);
    }
}
