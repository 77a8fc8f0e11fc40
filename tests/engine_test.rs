//! Engine lifecycle and dump tests.

mod common;

use std::time::Duration;

use common::{region, FixedHeap, Fixture, RecordingHooks};
use native_metrics::collectors::heap::HeapRegion;
use native_metrics::{EngineConfig, GcKind, HostBindings, MetricsEngine, MetricsError};

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn new_engine_is_disabled() {
    let fixture = Fixture::new();
    let engine = fixture.engine(EngineConfig::default());
    assert!(!engine.is_enabled());
    assert!(!fixture.scheduler.is_installed());
}

#[test]
fn enable_twice_fails_without_side_effects() {
    let fixture = Fixture::new();
    let mut engine = fixture.engine(EngineConfig::default());
    engine.enable().unwrap();

    let err = engine.enable().unwrap_err();
    assert_eq!(err, MetricsError::AlreadyEnabled);
    assert_eq!(err.to_string(), "Already started");
    assert!(err.is_usage_error());
    assert!(engine.is_enabled());
}

#[test]
fn disable_when_disabled_fails() {
    let fixture = Fixture::new();
    let mut engine = fixture.engine(EngineConfig::default());
    let err = engine.disable().unwrap_err();
    assert_eq!(err, MetricsError::NotEnabled);
    assert_eq!(err.to_string(), "Not running");
}

#[test]
fn dump_when_disabled_fails() {
    let fixture = Fixture::new();
    let mut engine = fixture.engine(EngineConfig::default());
    assert_eq!(engine.dump().unwrap_err(), MetricsError::NotEnabled);
    assert_eq!(engine.dump_value().unwrap_err(), MetricsError::NotEnabled);
}

#[test]
fn enable_installs_and_disable_removes_hooks() {
    let fixture = Fixture::new();
    let mut engine = fixture.engine(EngineConfig::default());
    engine.enable().unwrap();
    assert!(fixture.scheduler.is_installed());
    assert!(fixture.gc.is_installed());
    assert!(engine.span_tracker().is_active());

    engine.disable().unwrap();
    assert!(!fixture.scheduler.is_installed());
    assert!(!fixture.gc.is_installed());
    assert!(!engine.span_tracker().is_active());
    assert!(!engine.is_enabled());
}

#[test]
fn hook_failure_rolls_back_started_collectors() {
    let fixture = Fixture::new();
    let host = HostBindings {
        scheduler: Box::new(RecordingHooks::failing()),
        ..fixture.bindings(FixedHeap::default())
    };
    let mut engine = MetricsEngine::new(EngineConfig::default(), host);

    let err = engine.enable().unwrap_err();
    assert!(matches!(err, MetricsError::HookInstall { hook: "scheduler", .. }));
    assert!(!err.is_usage_error());
    assert!(!engine.is_enabled());
    // The GC tracker started before the failing sampler and was undone.
    assert!(!fixture.gc.is_installed());
}

#[test]
fn engine_can_be_reenabled() {
    let fixture = Fixture::new();
    let mut engine = fixture.engine(EngineConfig::default());
    engine.enable().unwrap();
    engine.disable().unwrap();
    engine.enable().unwrap();
    assert!(engine.dump().is_ok());
}

// =============================================================================
// Event Loop
// =============================================================================

#[test]
fn loop_iterations_feed_latency_histogram() {
    let fixture = Fixture::new();
    let mut engine = fixture.engine(EngineConfig::default());
    engine.enable().unwrap();

    // 200ns of work before the poll, which waits its full 1ms timeout.
    fixture.clock.advance(200);
    engine.on_loop_prepare(Some(Duration::from_millis(1)));
    fixture.clock.advance(1_000_000);
    engine.on_loop_check();

    // 50ns of work, then a poll that overruns a 1µs timeout by 4µs.
    fixture.clock.advance(50);
    engine.on_loop_prepare(Some(Duration::from_micros(1)));
    fixture.clock.advance(5_000);
    engine.on_loop_check();

    let snapshot = engine.dump().unwrap();
    assert_eq!(snapshot.event_loop.count, 2);
    assert_eq!(snapshot.event_loop.min, 200);
    assert_eq!(snapshot.event_loop.max, 4_050);
    assert_eq!(snapshot.event_loop.sum, 4_250);

    // Both polls count as idle in full, overrun included.
    assert_eq!(snapshot.loop_utilization.idle_nanos, 1_005_000);
    assert_eq!(snapshot.loop_utilization.active_nanos, 250);
    assert_eq!(snapshot.loop_utilization.ratio(), Some(250.0 / 1_005_250.0));

    let next = engine.dump().unwrap();
    assert_eq!(next.loop_utilization.ratio(), None);
}

#[test]
fn event_loop_tracking_can_be_turned_off() {
    let fixture = Fixture::new();
    let config = EngineConfig {
        track_event_loop: false,
        ..EngineConfig::default()
    };
    let mut engine = fixture.engine(config);
    engine.enable().unwrap();
    assert!(!fixture.scheduler.is_installed());

    engine.on_loop_prepare(None);
    fixture.clock.advance(10);
    engine.on_loop_check();
    assert!(engine.dump().unwrap().event_loop.is_empty());
}

// =============================================================================
// Dump
// =============================================================================

#[test]
fn second_dump_has_empty_deltas() {
    let fixture = Fixture::new();
    let mut engine = fixture.engine(EngineConfig::default());
    engine.enable().unwrap();

    engine.on_loop_prepare(None);
    fixture.clock.advance(100);
    engine.on_loop_check();
    engine.on_gc_begin();
    fixture.clock.advance(30);
    engine.on_gc_end(GcKind::Scavenge);
    fixture.cpu.set(5_000, 1_000);

    let first = engine.dump().unwrap();
    assert_eq!(first.event_loop.count, 1);
    assert_eq!(first.gc_bucket(GcKind::All).count, 1);
    assert_eq!(first.cpu.user_micros, 5_000);

    let second = engine.dump().unwrap();
    assert!(second.event_loop.is_empty());
    assert!(second.gc.values().all(|bucket| bucket.is_empty()));
    assert_eq!(second.cpu.user_micros, 0);
    assert_eq!(second.cpu.system_micros, 0);
}

#[test]
fn heap_is_read_fresh_each_dump() {
    let fixture = Fixture::new();
    let heap = FixedHeap(vec![
        Some(region("new_space", 1_024, 512)),
        None,
        Some(region("old_space", 4_096, 1_000)),
    ]);
    let mut engine = MetricsEngine::new(EngineConfig::default(), fixture.bindings(heap));
    engine.enable().unwrap();

    for _ in 0..2 {
        let snapshot = engine.dump().unwrap();
        assert_eq!(snapshot.heap.len(), 3);
        assert_eq!(snapshot.heap[0].stats().unwrap().name, "new_space");
        assert_eq!(snapshot.heap[1], HeapRegion::Unavailable { index: 1 });
        assert_eq!(snapshot.heap[2].stats().unwrap().available_bytes, 3_096);
    }
}

#[test]
fn disable_resets_aggregates() {
    let fixture = Fixture::new();
    let mut engine = fixture.engine(EngineConfig::default());
    engine.enable().unwrap();
    engine.on_gc_begin();
    fixture.clock.advance(30);
    engine.on_gc_end(GcKind::Scavenge);
    let _open = engine.track("job");

    engine.disable().unwrap();
    engine.enable().unwrap();

    let snapshot = engine.dump().unwrap();
    assert!(snapshot.gc.values().all(|bucket| bucket.is_empty()));
    assert_eq!(snapshot.spans.unfinished_total, 0);
}

#[test]
fn dump_value_encodes_with_labels() {
    let fixture = Fixture::new();
    let mut engine = fixture.engine(EngineConfig::default());
    engine.enable().unwrap();
    engine.on_gc_begin();
    fixture.clock.advance(8);
    engine.on_gc_end(GcKind::MarkSweepCompact);

    let value = engine.dump_value().unwrap();
    let strings = value.get("strings").and_then(|s| s.as_list()).unwrap();
    assert!(strings.iter().any(|s| s.as_str() == Some("mark_sweep_compact")));
    assert!(engine.interned_strings().get("all").is_some());

    engine.clear_interned_strings();
    assert!(engine.interned_strings().is_empty());
}

#[test]
fn shared_engine_is_lockable() {
    let fixture = Fixture::new();
    let shared = fixture.engine(EngineConfig::default()).into_shared();
    shared.lock().enable().unwrap();
    let handle = std::thread::spawn({
        let shared = shared.clone();
        move || shared.lock().dump().map(|s| s.spans.finished_total)
    });
    assert_eq!(handle.join().unwrap(), Ok(0));
}

#[test]
fn uptime_counts_from_engine_creation() {
    let fixture = Fixture::new();
    fixture.clock.set(1_000);
    let mut engine = fixture.engine(EngineConfig::default());

    fixture.clock.advance(4_000);
    engine.enable().unwrap();
    fixture.clock.advance(2_000_000_000);
    assert_eq!(engine.dump().unwrap().uptime_nanos, 2_000_004_000);

    // Re-enabling does not restart the uptime.
    engine.disable().unwrap();
    engine.enable().unwrap();
    fixture.clock.advance(1_000);
    assert_eq!(engine.dump().unwrap().uptime_nanos, 2_000_005_000);
}

#[test]
fn debug_output_names_engine() {
    let fixture = Fixture::new();
    let engine = fixture.engine(EngineConfig::default());
    assert!(format!("{engine:?}").starts_with("MetricsEngine"));
}

#[test]
fn from_env_uses_loaded_config() {
    let fixture = Fixture::new();
    let engine = MetricsEngine::from_env(fixture.bindings(FixedHeap::default()));
    assert!(engine.config().compression >= native_metrics::histogram::MIN_COMPRESSION);
    assert!(!engine.is_enabled());
}
