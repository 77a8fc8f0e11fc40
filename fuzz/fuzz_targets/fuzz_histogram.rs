//! Fuzz target for histogram aggregation.
//!
//! Arbitrary sample streams and percentile queries must keep the exact
//! fields consistent and every percentile inside `[min, max]`.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use native_metrics::histogram::Histogram;

#[derive(Debug, Arbitrary)]
struct Input {
    compression: u16,
    samples: Vec<u64>,
    queries: Vec<f64>,
    merge_split: u8,
}

fuzz_target!(|input: Input| {
    let compression = u32::from(input.compression % 2_000);
    let split = input.samples.len() * usize::from(input.merge_split) / 256;
    let (left, right) = input.samples.split_at(split);

    let mut a = Histogram::with_compression(compression);
    let mut b = Histogram::with_compression(compression);
    left.iter().for_each(|&v| a.add(v));
    right.iter().for_each(|&v| b.add(v));
    a.merge(&b);

    assert_eq!(a.count(), input.samples.len() as u64);
    if let (Some(&min), Some(&max)) = (input.samples.iter().min(), input.samples.iter().max()) {
        assert_eq!(a.min(), min);
        assert_eq!(a.max(), max);
    }
    for q in input.queries {
        let v = a.percentile(q);
        assert!(a.count() == 0 || (a.min() <= v && v <= a.max()));
    }
});
