//! Statistical kernels for sample evaluation.
//!
//! This module provides the statistics behind the sampling controller:
//! - Running summary of per-operation periods (mean, variance, margin of
//!   error at 95% confidence via Student's t)
//! - Mann–Whitney U comparison between two finished benchmarks

mod summary;
mod utest;

pub use summary::{critical_t, Stats};
pub use utest::{compare_samples, u_statistic};
