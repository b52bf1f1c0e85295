//! Terminal formatting for benchmarks and suites.

use colored::Colorize;

use crate::benchmark::Benchmark;
use crate::suite::Suite;

/// Format a number with thousands separators. Values below 100 keep two
/// decimals; larger values round to whole units.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return format!("{value}");
    }
    if value.abs() < 100.0 {
        return format!("{value:.2}");
    }
    let rounded = value.round() as i64;
    let digits = rounded.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// One-line summary: `name x 1,234,567 ops/sec ±0.88% (34 runs sampled)`.
///
/// Errored benchmarks render the failure instead of a rate.
pub fn format_benchmark(bench: &Benchmark) -> String {
    if let Some(error) = &bench.error {
        return format!("{}: {}", bench.name, error);
    }
    let size = bench.stats.sample.len();
    format!(
        "{} x {} ops/sec \u{00b1}{:.2}% ({} run{} sampled)",
        bench.name,
        format_number(bench.hz),
        bench.stats.rme,
        size,
        if size == 1 { "" } else { "s" },
    )
}

/// Multi-line suite report: one line per benchmark, the fastest in green,
/// failures in red, with a closing fastest-is line.
pub fn report_suite(suite: &Suite) -> String {
    let fastest: Vec<&str> = suite.fastest().iter().map(|b| b.name.as_str()).collect();
    let mut out = String::new();
    for bench in suite.iter() {
        let line = format_benchmark(bench);
        let line = if bench.error.is_some() {
            line.red().to_string()
        } else if fastest.contains(&bench.name.as_str()) {
            line.green().to_string()
        } else {
            line
        };
        out.push_str(&line);
        out.push('\n');
    }
    if !fastest.is_empty() {
        out.push_str(&format!("Fastest is {}\n", fastest.join(", ").bold()));
    }
    out
}
