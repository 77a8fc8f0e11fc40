//! Span tracking benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use native_metrics::collectors::Collector;
use native_metrics::SpanTracker;

fn active_tracker() -> SpanTracker {
    let mut tracker = SpanTracker::new();
    let _ = tracker.start(0);
    tracker
}

fn bench_track_finish_drop(c: &mut Criterion) {
    let mut group = c.benchmark_group("span_lifecycle");
    let tracker = active_tracker();

    group.throughput(Throughput::Elements(1));
    group.bench_function("track_finish_drop", |b| {
        b.iter(|| {
            let mut handle = tracker.track(black_box("db.query"));
            handle.finish();
            drop(black_box(handle))
        })
    });
    group.bench_function("track_abandon", |b| {
        b.iter(|| drop(black_box(tracker.track(black_box("http.request")))))
    });

    group.finish();
}

fn bench_totals(c: &mut Criterion) {
    let mut group = c.benchmark_group("span_totals");

    for names in [10usize, 1_000] {
        let tracker = active_tracker();
        let handles: Vec<_> = (0..names)
            .map(|i| tracker.track(&format!("op.{i}")))
            .collect();
        group.bench_function(BenchmarkId::new("names", names), |b| {
            b.iter(|| black_box(tracker.totals()))
        });
        drop(handles);
    }

    group.finish();
}

criterion_group!(benches, bench_track_finish_drop, bench_totals);
criterion_main!(benches);
