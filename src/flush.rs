//! Background flush loop: dump the engine on a fixed cadence.
//!
//! Each tick takes the engine lock only long enough to dump, then hands
//! the snapshot to the sink outside the lock. A dump that fails (engine
//! disabled in the meantime) is logged and the loop keeps ticking.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::engine::SharedEngine;
use crate::snapshot::Snapshot;

/// Spawn the flush loop. Returns a handle that completes after `shutdown`
/// is cancelled.
pub fn spawn_flush_loop<F>(
    engine: SharedEngine,
    interval: Duration,
    sink: F,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    F: FnMut(Snapshot) + Send + 'static,
{
    tokio::spawn(flush_loop(engine, interval, sink, shutdown))
}

async fn flush_loop<F>(
    engine: SharedEngine,
    interval: Duration,
    mut sink: F,
    shutdown: CancellationToken,
) where
    F: FnMut(Snapshot) + Send + 'static,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {
                tracing::info!("flush: shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                let result = engine.lock().dump();
                match result {
                    Ok(snapshot) => sink(snapshot),
                    Err(err) => tracing::warn!(error = %err, "flush: dump failed"),
                }
            }
        }
    }
}
