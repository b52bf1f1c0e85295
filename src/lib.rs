//! # microbench
//!
//! A micro-benchmarking engine: give it a test routine and it determines how
//! many operations per second the routine performs, together with the
//! confidence of that estimate.
//!
//! Three subsystems do the real work:
//! - the **clock loop** picks and calibrates a timer, then grows the
//!   per-batch iteration count until timer noise is amortized away;
//! - the **sampling controller** repeats the measurement to build a sample
//!   distribution and stops once the margin of error is trustworthy or the
//!   time budget is spent;
//! - the **deferred protocol** lets a test body signal completion explicitly
//!   instead of returning, for asynchronous workloads.
//!
//! ## Quick start
//!
//! ```no_run
//! use microbench::Benchmark;
//!
//! let mut bench = Benchmark::new("push", || {
//!     let mut v = Vec::with_capacity(16);
//!     for i in 0..16 {
//!         v.push(std::hint::black_box(i));
//!     }
//!     std::hint::black_box(&v);
//! })
//! .max_time(1.0);
//!
//! bench.run();
//! println!("{bench}"); // push x 12,345,678 ops/sec ±0.54% (42 runs sampled)
//! ```
//!
//! ## Comparing alternatives
//!
//! ```no_run
//! use microbench::Suite;
//!
//! let mut suite = Suite::new("string building");
//! suite.add_fn("format", || {
//!     std::hint::black_box(format!("{}-{}", 1, 2));
//! });
//! suite.add_fn("concat", || {
//!     std::hint::black_box(String::from("1") + "-" + "2");
//! });
//! suite.run();
//! print!("{}", microbench::output::report_suite(&suite));
//! ```
//!
//! ## Deferred bodies
//!
//! A body that finishes asynchronously receives a [`Deferred`] handle and
//! calls [`Deferred::resolve`] when done; the clock keeps running until the
//! final resolve of the batch.
//!
//! ```no_run
//! use microbench::Benchmark;
//!
//! let mut bench = Benchmark::deferred("io-ish", |deferred| {
//!     std::thread::spawn(move || {
//!         // ... the asynchronous work ...
//!         deferred.resolve();
//!     });
//! });
//! bench.run();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod benchmark;
mod config;
mod constants;
mod error;
mod event;
mod suite;

// Functional modules
pub mod measurement;
pub mod output;
pub mod statistics;
pub(crate) mod sampling;

// Re-exports for the public API
pub use benchmark::{Benchmark, Times};
pub use config::BenchOptions;
pub use error::BenchError;
pub use event::{CycleReport, Event, EventKind, EventTarget};
pub use measurement::{
    black_box, probe_resolution, Deferred, InstantSource, TimeSource, Timer, TimerRegistry,
    WallClockSource,
};
pub use statistics::{compare_samples, critical_t, Stats};
pub use suite::{Suite, SuiteRunOptions};

/// Measure a routine with default options and return the finished benchmark.
///
/// Shorthand for constructing a [`Benchmark`] and calling `run`.
///
/// # Example
///
/// ```no_run
/// let bench = microbench::bench("sum", || {
///     std::hint::black_box((0..100u64).sum::<u64>());
/// });
/// assert!(bench.hz > 0.0);
/// ```
pub fn bench<F>(name: impl Into<String>, body: F) -> Benchmark
where
    F: Fn() + 'static,
{
    let mut bench = Benchmark::new(name, body);
    bench.run();
    bench
}
