//! Compare alternatives with a suite and report the fastest.

use microbench::{output, EventKind, Suite};

fn main() {
    let mut suite = Suite::new("string building");
    suite.on(EventKind::Cycle, |event| {
        eprintln!("finished: {}", event.target.name);
    });

    suite.add_fn("format", || {
        std::hint::black_box(format!("{}-{}", 1, 2));
    });
    suite.add_fn("push_str", || {
        let mut s = String::with_capacity(8);
        s.push_str("1");
        s.push('-');
        s.push_str("2");
        std::hint::black_box(s);
    });
    suite.add_fn("concat", || {
        std::hint::black_box(String::from("1") + "-" + "2");
    });

    suite.run();
    print!("{}", output::report_suite(&suite));
}
