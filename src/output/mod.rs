//! Human-readable formatting of benchmark results.

mod terminal;

pub use terminal::{format_benchmark, format_number, report_suite};
