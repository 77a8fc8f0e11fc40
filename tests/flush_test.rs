//! Background flush loop tests.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::quiet_engine;
use native_metrics::flush::spawn_flush_loop;
use native_metrics::Snapshot;
use tokio_util::sync::CancellationToken;

fn collecting_sink() -> (Arc<Mutex<Vec<Snapshot>>>, impl FnMut(Snapshot) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::<Snapshot>::new()));
    let sink = {
        let seen = seen.clone();
        move |snapshot: Snapshot| seen.lock().unwrap().push(snapshot)
    };
    (seen, sink)
}

#[tokio::test(start_paused = true)]
async fn flush_dumps_on_each_tick() {
    let (mut engine, _clock) = quiet_engine();
    engine.enable().unwrap();
    let shared = engine.into_shared();
    let _open = shared.lock().track("job");

    let (seen, sink) = collecting_sink();
    let shutdown = CancellationToken::new();
    let handle = spawn_flush_loop(shared.clone(), Duration::from_millis(100), sink, shutdown.clone());

    tokio::time::sleep(Duration::from_millis(350)).await;
    shutdown.cancel();
    handle.await.unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.len() >= 3, "got {} dumps", seen.len());
    assert!(seen.iter().all(|s| s.spans.unfinished_total == 1));
}

#[tokio::test(start_paused = true)]
async fn flush_waits_one_interval_before_first_dump() {
    let (mut engine, _clock) = quiet_engine();
    engine.enable().unwrap();
    let (seen, sink) = collecting_sink();
    let shutdown = CancellationToken::new();
    let handle = spawn_flush_loop(engine.into_shared(), Duration::from_secs(10), sink, shutdown.clone());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(seen.lock().unwrap().is_empty());

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_dump_does_not_stop_loop() {
    let (engine, _clock) = quiet_engine();
    let shared = engine.into_shared();
    let (seen, sink) = collecting_sink();
    let shutdown = CancellationToken::new();
    let handle = spawn_flush_loop(shared.clone(), Duration::from_millis(100), sink, shutdown.clone());

    // Disabled: every tick fails to dump.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(seen.lock().unwrap().is_empty());

    shared.lock().enable().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!seen.lock().unwrap().is_empty());

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn cancel_stops_loop_promptly() {
    let (engine, _clock) = quiet_engine();
    let (_seen, sink) = collecting_sink();
    let shutdown = CancellationToken::new();
    let handle = spawn_flush_loop(engine.into_shared(), Duration::from_secs(3600), sink, shutdown.clone());

    shutdown.cancel();
    let joined = tokio::time::timeout(Duration::from_secs(1), handle).await;
    assert!(joined.is_ok());
}
