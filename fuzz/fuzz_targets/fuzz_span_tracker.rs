//! Fuzz target for span lifecycle bookkeeping.
//!
//! Any interleaving of track/finish/drop/restart must keep totals equal to
//! the per-name sums and never underflow.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use native_metrics::collectors::Collector;
use native_metrics::SpanTracker;

#[derive(Debug, Arbitrary)]
enum Op {
    Track(u8),
    Finish(u8),
    Drop(u8),
    Restart,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut tracker = SpanTracker::new();
    let _ = tracker.start(0);
    let mut handles = Vec::new();

    for op in ops {
        match op {
            Op::Track(name) => handles.push(tracker.track(&format!("op.{}", name % 4))),
            Op::Finish(i) if !handles.is_empty() => {
                let idx = usize::from(i) % handles.len();
                handles[idx].finish();
            }
            Op::Drop(i) if !handles.is_empty() => {
                let idx = usize::from(i) % handles.len();
                handles.swap_remove(idx);
            }
            Op::Restart => {
                tracker.stop();
                let _ = tracker.start(0);
            }
            _ => {}
        }

        let totals = tracker.totals();
        assert_eq!(totals.finished_total, totals.finished.values().sum::<u64>());
        assert_eq!(totals.unfinished_total, totals.unfinished.values().sum::<u64>());
    }
});
