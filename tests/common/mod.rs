//! Host fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use native_metrics::{
    Clock, CpuUsage, CpuUsageSource, EngineConfig, GcHooks, HeapIntrospector, HeapRegionStats,
    HostBindings, MetricsEngine, NoopHooks, SchedulerHooks,
};

/// Clock advanced by hand.
#[derive(Debug, Clone, Default)]
pub struct FakeClock(Arc<AtomicU64>);

impl FakeClock {
    pub fn set(&self, nanos: u64) {
        self.0.store(nanos, Ordering::SeqCst);
    }

    pub fn advance(&self, nanos: u64) {
        self.0.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_nanos(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Hook registration that records install state and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    pub installed: Arc<AtomicBool>,
    pub fail: Arc<AtomicBool>,
}

impl RecordingHooks {
    pub fn failing() -> Self {
        let hooks = Self::default();
        hooks.fail.store(true, Ordering::SeqCst);
        hooks
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    fn do_install(&mut self) -> Result<(), String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("hook table full".to_string());
        }
        self.installed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn do_uninstall(&mut self) {
        self.installed.store(false, Ordering::SeqCst);
    }
}

impl SchedulerHooks for RecordingHooks {
    fn install(&mut self) -> Result<(), String> {
        self.do_install()
    }

    fn uninstall(&mut self) {
        self.do_uninstall()
    }
}

impl GcHooks for RecordingHooks {
    fn install(&mut self) -> Result<(), String> {
        self.do_install()
    }

    fn uninstall(&mut self) {
        self.do_uninstall()
    }
}

/// Heap with fixed regions; `None` entries are unreadable.
#[derive(Debug, Clone, Default)]
pub struct FixedHeap(pub Vec<Option<HeapRegionStats>>);

impl HeapIntrospector for FixedHeap {
    fn region_count(&self) -> usize {
        self.0.len()
    }

    fn region(&self, index: usize) -> Option<HeapRegionStats> {
        self.0.get(index).cloned().flatten()
    }
}

pub fn region(name: &str, size: u64, used: u64) -> HeapRegionStats {
    HeapRegionStats {
        name: name.to_string(),
        size_bytes: size,
        used_bytes: used,
        available_bytes: size - used,
        physical_size_bytes: size,
    }
}

/// CPU source whose cumulative usage is set by the test.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCpu(Arc<Mutex<CpuUsage>>);

impl ScriptedCpu {
    pub fn set(&self, user_micros: u64, system_micros: u64) {
        *self.0.lock().unwrap() = CpuUsage {
            user_micros,
            system_micros,
        };
    }
}

impl CpuUsageSource for ScriptedCpu {
    fn cumulative(&self) -> CpuUsage {
        *self.0.lock().unwrap()
    }
}

/// Handles to every fake behind one engine.
pub struct Fixture {
    pub clock: FakeClock,
    pub scheduler: RecordingHooks,
    pub gc: RecordingHooks,
    pub cpu: ScriptedCpu,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            clock: FakeClock::default(),
            scheduler: RecordingHooks::default(),
            gc: RecordingHooks::default(),
            cpu: ScriptedCpu::default(),
        }
    }

    pub fn bindings(&self, heap: FixedHeap) -> HostBindings {
        HostBindings {
            clock: Box::new(self.clock.clone()),
            scheduler: Box::new(self.scheduler.clone()),
            gc: Box::new(self.gc.clone()),
            heap: Box::new(heap),
            cpu: Box::new(self.cpu.clone()),
        }
    }

    pub fn engine(&self, config: EngineConfig) -> MetricsEngine {
        MetricsEngine::new(config, self.bindings(FixedHeap::default()))
    }
}

/// Engine over inert host bindings and a hand-driven clock.
pub fn quiet_engine() -> (MetricsEngine, FakeClock) {
    let clock = FakeClock::default();
    let host = HostBindings {
        clock: Box::new(clock.clone()),
        scheduler: Box::new(NoopHooks),
        gc: Box::new(NoopHooks),
        heap: Box::new(FixedHeap::default()),
        cpu: Box::new(ScriptedCpu::default()),
    };
    (MetricsEngine::new(EngineConfig::default(), host), clock)
}
