//! The metrics engine: one explicit owner for every collector.
//!
//! Hosts construct a single engine, forward their scheduler and GC
//! callbacks to it, and call [`MetricsEngine::dump`] on their reporting
//! cadence. Everything runs on the caller's thread; wrap the engine in a
//! [`SharedEngine`] to dump from a background flush task.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::collectors::{
    Collector, EventLoopSampler, GcKind, GcPauseTracker, HeapSnapshotReader, ProcessUsageSampler,
};
use crate::config::EngineConfig;
use crate::error::{MetricsError, MetricsResult};
use crate::host::{Clock, HostBindings};
use crate::snapshot::{Snapshot, SnapshotValue, SnapshotWriter, StringInterner};
use crate::spans::{SpanHandle, SpanTracker};

/// Engine shared between the host thread and a flush task.
pub type SharedEngine = Arc<Mutex<MetricsEngine>>;

pub struct MetricsEngine {
    config: EngineConfig,
    clock: Box<dyn Clock>,
    event_loop: EventLoopSampler,
    gc: GcPauseTracker,
    heap: HeapSnapshotReader,
    process: ProcessUsageSampler,
    spans: SpanTracker,
    writer: SnapshotWriter,
    created_at: u64,
    enabled: bool,
}

impl MetricsEngine {
    pub fn new(config: EngineConfig, host: HostBindings) -> Self {
        let HostBindings {
            clock,
            scheduler,
            gc,
            heap,
            cpu,
        } = host;
        let created_at = clock.now_nanos();
        Self {
            event_loop: EventLoopSampler::new(scheduler, config.compression),
            gc: GcPauseTracker::new(gc, config.compression),
            heap: HeapSnapshotReader::new(heap),
            process: ProcessUsageSampler::new(cpu),
            spans: SpanTracker::new(),
            writer: SnapshotWriter::new(),
            clock,
            config,
            created_at,
            enabled: false,
        }
    }

    /// Engine configured from `NATIVE_METRICS_*` environment variables.
    pub fn from_env(host: HostBindings) -> Self {
        Self::new(crate::config::load().engine, host)
    }

    /// Wrap for sharing with a flush task.
    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Collectors taking part in this configuration, in fixed order.
    fn collectors(&mut self) -> Vec<&mut dyn Collector> {
        let mut out: Vec<&mut dyn Collector> = Vec::with_capacity(5);
        if self.config.track_gc {
            out.push(&mut self.gc);
        }
        if self.config.track_event_loop {
            out.push(&mut self.event_loop);
        }
        out.push(&mut self.spans);
        out.push(&mut self.heap);
        out.push(&mut self.process);
        out
    }

    /// Start sampling.
    pub fn enable(&mut self) -> MetricsResult<()> {
        if self.enabled {
            return Err(MetricsError::AlreadyEnabled);
        }
        let now = self.clock.now_nanos();
        let mut collectors = self.collectors();
        for i in 0..collectors.len() {
            if let Err(err) = collectors[i].start(now) {
                tracing::error!(collector = collectors[i].name(), error = %err, "collector failed to start");
                for started in collectors[..i].iter_mut() {
                    started.stop();
                }
                return Err(err);
            }
        }
        let names: Vec<&'static str> = collectors.iter().map(|c| c.name()).collect();
        drop(collectors);
        self.enabled = true;
        tracing::info!(collectors = ?names, "runtime metrics enabled");
        Ok(())
    }

    /// Stop sampling and clear all counters.
    pub fn disable(&mut self) -> MetricsResult<()> {
        if !self.enabled {
            return Err(MetricsError::NotEnabled);
        }
        for collector in self.collectors() {
            collector.stop();
        }
        self.enabled = false;
        tracing::info!("runtime metrics disabled");
        Ok(())
    }

    /// Read every aggregate and reset the delta-based ones.
    pub fn dump(&mut self) -> MetricsResult<Snapshot> {
        if !self.enabled {
            return Err(MetricsError::NotEnabled);
        }
        let now = self.clock.now_nanos();
        let mut snapshot = Snapshot {
            uptime_nanos: now.saturating_sub(self.created_at),
            ..Snapshot::default()
        };
        for collector in self.collectors() {
            collector.contribute(now, &mut snapshot);
        }
        Ok(snapshot)
    }

    /// [`dump`](Self::dump), encoded with interned labels.
    pub fn dump_value(&mut self) -> MetricsResult<SnapshotValue> {
        let snapshot = self.dump()?;
        Ok(self.writer.write(&snapshot))
    }

    /// Encode an existing snapshot with this engine's interner.
    pub fn encode(&mut self, snapshot: &Snapshot) -> SnapshotValue {
        self.writer.write(snapshot)
    }

    /// Current label table.
    pub fn interned_strings(&self) -> &StringInterner {
        self.writer.interner()
    }

    /// Reset the label table; ids restart at 0 on the next encode.
    pub fn clear_interned_strings(&mut self) {
        self.writer.clear();
    }

    /// Begin tracking one operation.
    pub fn track(&self, name: &str) -> SpanHandle {
        self.spans.track(name)
    }

    /// Mark a tracked operation complete.
    pub fn finish(&self, handle: &mut SpanHandle) {
        self.spans.finish(handle);
    }

    pub fn span_tracker(&self) -> &SpanTracker {
        &self.spans
    }

    /// Scheduler prepare callback.
    pub fn on_loop_prepare(&mut self, poll_timeout: Option<Duration>) {
        let now = self.clock.now_nanos();
        self.event_loop.on_prepare(now, poll_timeout);
    }

    /// Scheduler check callback.
    pub fn on_loop_check(&mut self) {
        let now = self.clock.now_nanos();
        self.event_loop.on_check(now);
    }

    /// GC prologue callback.
    pub fn on_gc_begin(&mut self) {
        let now = self.clock.now_nanos();
        self.gc.on_gc_begin(now);
    }

    /// GC epilogue callback.
    pub fn on_gc_end(&mut self, kind: GcKind) {
        let now = self.clock.now_nanos();
        self.gc.on_gc_end(now, kind);
    }
}

impl std::fmt::Debug for MetricsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsEngine")
            .field("enabled", &self.enabled)
            .field("config", &self.config)
            .field("event_loop", &self.event_loop)
            .field("gc", &self.gc)
            .field("spans", &self.spans)
            .finish_non_exhaustive()
    }
}
