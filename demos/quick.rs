//! Minimal usage: measure one routine and print its rate.

use microbench::Benchmark;

fn main() {
    let mut bench = Benchmark::new("format-u64", || {
        std::hint::black_box(1234567u64.to_string());
    })
    .max_time(2.0);

    bench.run();
    println!("{bench}");
    println!(
        "  mean {:.2} ns, moe ±{:.2} ns, {} samples",
        bench.stats.mean * 1e9,
        bench.stats.moe * 1e9,
        bench.stats.sample.len()
    );
}
