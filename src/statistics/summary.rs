//! Running summary statistics over the gathered sample.

use serde::{Deserialize, Serialize};

use crate::constants::{T_INFINITY, T_TABLE};

/// Critical two-tailed t value at 95% confidence for `df` degrees of
/// freedom. Zero degrees of freedom are treated as one; above 30 the normal
/// approximation applies.
pub fn critical_t(df: usize) -> f64 {
    let df = df.max(1);
    if df <= T_TABLE.len() {
        T_TABLE[df - 1]
    } else {
        T_INFINITY
    }
}

/// Sample distribution of per-operation periods with derived statistics.
///
/// `push` appends a sample and recomputes every derived field in the same
/// call, so an observer never sees the sample vector and the statistics
/// disagree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Per-operation periods in the order their cycles completed, seconds.
    pub sample: Vec<f64>,
    /// Arithmetic mean of the sample, seconds.
    pub mean: f64,
    /// Unbiased sample variance; zero for fewer than two samples.
    pub variance: f64,
    /// Sample standard deviation.
    pub deviation: f64,
    /// Standard error of the mean.
    pub sem: f64,
    /// Margin of error at 95% confidence.
    pub moe: f64,
    /// Margin of error as a percentage of the mean.
    pub rme: f64,
}

impl Stats {
    /// Append one sample and recompute the derived statistics.
    pub fn push(&mut self, period: f64) {
        self.sample.push(period);
        self.recompute();
    }

    /// Recompute every derived field from the current sample.
    pub fn recompute(&mut self) {
        let n = self.sample.len();
        if n == 0 {
            let sample = std::mem::take(&mut self.sample);
            *self = Stats {
                sample,
                ..Stats::default()
            };
            return;
        }
        let nf = n as f64;
        let mean = self.sample.iter().sum::<f64>() / nf;
        let variance = if n > 1 {
            self.sample.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (nf - 1.0)
        } else {
            0.0
        };
        let deviation = variance.sqrt();
        let sem = deviation / nf.sqrt();
        let moe = sem * critical_t(n - 1);
        let rme = if mean > 0.0 { (moe / mean) * 100.0 } else { 0.0 };

        self.mean = mean;
        self.variance = variance;
        self.deviation = deviation;
        self.sem = sem;
        self.moe = moe;
        self.rme = rme;
    }

    /// Discard the sample and zero the derived statistics.
    pub fn clear(&mut self) {
        *self = Stats::default();
    }
}
