//! Mann–Whitney U comparison between two samples.
//!
//! Decides whether two benchmarks' period distributions differ at p = 0.05.
//! Small pairings use the exact critical-U table; once the combined sample
//! size exceeds 30 the normal approximation takes over.

use crate::constants::{
    U_NORMAL_THRESHOLD, U_TABLE, U_TABLE_MIN_LARGER, U_TABLE_MIN_SMALLER,
};

/// Rank score of `x` against one sample: one point for every value below
/// `x`, half a point for every tie.
fn u_score(x: f64, sample: &[f64]) -> f64 {
    sample
        .iter()
        .map(|&y| {
            if y < x {
                1.0
            } else if y > x {
                0.0
            } else {
                0.5
            }
        })
        .sum()
}

/// The U statistic of `a` measured against `b`.
pub fn u_statistic(a: &[f64], b: &[f64]) -> f64 {
    a.iter().map(|&x| u_score(x, b)).sum()
}

/// Critical U value for the given pairing, if the exact table covers it.
fn critical_u(larger: usize, smaller: usize) -> Option<f64> {
    if larger < U_TABLE_MIN_LARGER || smaller < U_TABLE_MIN_SMALLER {
        return None;
    }
    U_TABLE
        .get(larger - U_TABLE_MIN_LARGER)
        .and_then(|row| row.get(smaller - U_TABLE_MIN_SMALLER))
        .map(|&v| f64::from(v))
}

/// Compare two samples of per-operation periods.
///
/// Returns `1` when `a` is significantly faster (its periods rank lower),
/// `-1` when `b` is, and `0` when the difference is not significant or the
/// pairing is too small for the table.
pub fn compare_samples(a: &[f64], b: &[f64]) -> i32 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let n1 = a.len();
    let n2 = b.len();
    let u1 = u_statistic(a, b);
    let u2 = u_statistic(b, a);
    let u = u1.min(u2);

    let winner = if u == u1 { 1 } else { -1 };

    if n1 + n2 > U_NORMAL_THRESHOLD {
        let nn = (n1 * n2) as f64;
        let z = (u - nn / 2.0) / ((nn * (n1 + n2 + 1) as f64) / 12.0).sqrt();
        return if z.abs() > 1.96 { winner } else { 0 };
    }

    match critical_u(n1.max(n2), n1.min(n2)) {
        Some(critical) if u <= critical => winner,
        _ => 0,
    }
}
