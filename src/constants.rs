//! Numeric tables used by the statistics and cycle-control code.

/// Critical values of Student's t-distribution, two-tailed, 95% confidence,
/// indexed by `df - 1` for 1 ≤ df ≤ 30.
pub const T_TABLE: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228,
    2.201, 2.179, 2.16, 2.145, 2.131, 2.12, 2.11, 2.101, 2.093, 2.086,
    2.08, 2.074, 2.069, 2.064, 2.06, 2.056, 2.052, 2.048, 2.045, 2.042,
];

/// Critical t value for df > 30 (normal approximation).
pub const T_INFINITY: f64 = 1.96;

/// Critical values of the Mann–Whitney U statistic, two-tailed, p = 0.05.
///
/// Row `i` holds the values for a larger sample of size `i + 5`; within a
/// row the index is `smaller_size - 3`. Pairings outside the table (larger
/// size below 5 or smaller size below 3) have no critical value and the
/// comparison is indeterminate. Pairings whose combined size exceeds 30 are
/// decided by the z-score branch instead and never consult the table.
pub const U_TABLE: [&[u32]; 26] = [
    &[0, 1, 2],
    &[1, 2, 3, 5],
    &[1, 3, 5, 6, 8],
    &[2, 4, 6, 8, 10, 13],
    &[2, 4, 7, 10, 12, 15, 17],
    &[3, 5, 8, 11, 14, 17, 20, 23],
    &[3, 6, 9, 13, 16, 19, 23, 26, 30],
    &[4, 7, 11, 14, 18, 22, 26, 29, 33, 37],
    &[4, 8, 12, 16, 20, 24, 28, 33, 37, 41, 45],
    &[5, 9, 13, 17, 22, 26, 31, 36, 40, 45, 50, 55],
    &[5, 10, 14, 19, 24, 29, 34, 39, 44, 49, 54, 59, 64],
    &[6, 11, 15, 21, 26, 31, 37, 42, 47, 53, 59, 64, 70, 75],
    &[6, 11, 17, 22, 28, 34, 39, 45, 51, 57, 63, 67, 75, 81, 87],
    &[7, 12, 18, 24, 30, 36, 42, 48, 55, 61, 67, 74, 80, 86, 93, 99],
    &[7, 13, 19, 25, 32, 38, 45, 52, 58, 65, 72, 78, 85, 92, 99, 106, 113],
    &[8, 14, 20, 27, 34, 41, 48, 55, 62, 69, 76, 83, 90, 98, 105, 112, 119, 127],
    &[8, 15, 22, 29, 36, 43, 50, 58, 65, 73, 80, 88, 96, 103, 111, 119, 126, 134, 142],
    &[9, 16, 23, 30, 38, 45, 53, 61, 69, 77, 85, 93, 101, 109, 117, 125, 133, 141, 150, 158],
    &[9, 17, 24, 32, 40, 48, 56, 64, 73, 81, 89, 98, 106, 115, 123, 132, 140, 149, 157, 166, 175],
    &[10, 17, 25, 33, 42, 50, 59, 67, 76, 85, 94, 102, 111, 120, 129, 138, 147, 156, 165, 174, 183, 192],
    &[10, 18, 27, 35, 44, 53, 62, 71, 80, 89, 98, 107, 117, 126, 135, 145, 154, 163, 173, 182, 192, 201, 211],
    &[11, 19, 28, 37, 46, 55, 64, 74, 83, 93, 102, 112, 122, 132, 141, 151, 161, 171, 181, 191, 200, 210, 220, 230],
    &[11, 20, 29, 38, 48, 57, 67, 77, 87, 97, 107, 118, 125, 138, 147, 158, 168, 178, 188, 199, 209, 219, 230, 240, 250],
    &[12, 21, 30, 40, 50, 60, 70, 80, 90, 101, 111, 122, 132, 143, 154, 164, 175, 186, 196, 207, 218, 228, 239, 250, 261, 272],
    &[13, 22, 32, 42, 52, 62, 73, 83, 94, 105, 116, 127, 138, 149, 160, 171, 182, 193, 204, 215, 226, 238, 249, 260, 271, 282, 294],
    &[13, 23, 33, 43, 54, 65, 76, 87, 98, 109, 120, 131, 143, 154, 166, 177, 189, 200, 212, 223, 235, 247, 258, 270, 282, 294, 317],
];

/// Smallest larger-sample size the U table covers.
pub const U_TABLE_MIN_LARGER: usize = 5;

/// Smallest smaller-sample size the U table covers.
pub const U_TABLE_MIN_SMALLER: usize = 3;

/// Combined sample size above which the comparison switches to the
/// normal-approximation z-score.
pub const U_NORMAL_THRESHOLD: usize = 30;

/// Iteration target divided by the escalation divisor when a clock batch
/// registers zero elapsed time.
pub const ZERO_ELAPSED_TARGET: f64 = 4.0e6;

/// Escalation schedule for batches that register zero elapsed time, keyed by
/// cycle number. Cycle 5 has no divisor: the iteration count would have to be
/// infinite, meaning the timer cannot see this operation at all. The specific
/// divisors are a heuristic growth schedule, not a contract.
pub fn zero_elapsed_divisor(cycle: u64) -> Option<f64> {
    match cycle {
        1 => Some(4096.0),
        2 => Some(512.0),
        3 => Some(64.0),
        4 => Some(8.0),
        _ => None,
    }
}

/// Iterations of the timer-resolution probe.
pub const RESOLUTION_PROBE_ITERS: usize = 30;

/// Spin cap while the probe waits for a time source to tick; a source that
/// does not advance within this many reads is broken.
pub const RESOLUTION_PROBE_SPIN_CAP: usize = 1_000_000;

/// Floor for the default per-cycle minimum time, seconds.
pub const MIN_TIME_FLOOR: f64 = 0.05;

/// Target relative measurement uncertainty used to derive the default
/// minimum cycle time from timer resolution.
pub const UNCERTAINTY_TARGET: f64 = 0.01;

/// Resolution floor imposed on the wall-clock millisecond source, seconds.
pub const WALL_CLOCK_RESOLUTION_FLOOR: f64 = 1.5e-3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_table_shape() {
        assert_eq!(T_TABLE.len(), 30);
        assert_eq!(T_TABLE[0], 12.706);
        assert_eq!(T_TABLE[29], 2.042);
        // Critical values shrink toward the normal limit.
        for pair in T_TABLE.windows(2) {
            assert!(pair[0] > pair[1]);
        }
        assert!(T_TABLE[29] > T_INFINITY);
    }

    #[test]
    fn u_table_rows_grow() {
        for (i, row) in U_TABLE.iter().enumerate() {
            let larger = i + U_TABLE_MIN_LARGER;
            assert!(
                row.len() <= larger - U_TABLE_MIN_SMALLER + 1,
                "row {larger} too long"
            );
            for pair in row.windows(2) {
                assert!(pair[0] <= pair[1], "row {larger} not monotonic");
            }
        }
    }

    #[test]
    fn divisor_schedule() {
        assert_eq!(zero_elapsed_divisor(1), Some(4096.0));
        assert_eq!(zero_elapsed_divisor(4), Some(8.0));
        assert_eq!(zero_elapsed_divisor(5), None);
        assert_eq!(zero_elapsed_divisor(6), None);
    }
}
