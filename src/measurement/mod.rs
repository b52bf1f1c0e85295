//! Measurement machinery: timer selection, the clock loop, the cycle
//! controller, and the deferred-cycle protocol.

pub(crate) mod clock;
pub(crate) mod cycle;
pub mod deferred;
pub mod timer;

pub use deferred::Deferred;
pub use timer::{black_box, probe_resolution, InstantSource, TimeSource, Timer, TimerRegistry, WallClockSource};
