//! Interfaces the engine consumes from the host runtime.
//!
//! The host owns the real scheduler, garbage collector and heap. It installs
//! its own callbacks when asked and forwards them to the engine
//! (`on_loop_prepare`, `on_loop_check`, `on_gc_begin`, `on_gc_end`) on the
//! same thread that drives the loop.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Monotonic time source in nanoseconds.
pub trait Clock: Send {
    fn now_nanos(&self) -> u64;
}

/// Default clock: nanoseconds elapsed since construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Registration of the prepare/check callbacks around one loop iteration.
pub trait SchedulerHooks: Send {
    fn install(&mut self) -> Result<(), String>;
    fn uninstall(&mut self);
}

/// Registration of the GC prologue/epilogue callbacks.
pub trait GcHooks: Send {
    fn install(&mut self) -> Result<(), String>;
    fn uninstall(&mut self);
}

/// Hook stand-in for hosts that drive the callbacks unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl SchedulerHooks for NoopHooks {
    fn install(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn uninstall(&mut self) {}
}

impl GcHooks for NoopHooks {
    fn install(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn uninstall(&mut self) {}
}

/// Raw statistics for one heap region as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapRegionStats {
    pub name: String,
    pub size_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub physical_size_bytes: u64,
}

/// Point-in-time enumeration of heap regions.
pub trait HeapIntrospector: Send {
    fn region_count(&self) -> usize;
    /// Statistics for region `index`, or `None` when the host cannot
    /// provide them right now.
    fn region(&self, index: usize) -> Option<HeapRegionStats>;
}

/// Introspector for hosts without a segmented heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHeap;

impl HeapIntrospector for NoHeap {
    fn region_count(&self) -> usize {
        0
    }

    fn region(&self, _index: usize) -> Option<HeapRegionStats> {
        None
    }
}

/// Cumulative process CPU time, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuUsage {
    pub user_micros: u64,
    pub system_micros: u64,
}

/// Source of cumulative CPU usage since process start.
pub trait CpuUsageSource: Send {
    fn cumulative(&self) -> CpuUsage;
}

/// `getrusage(RUSAGE_SELF)` backed CPU source.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RusageCpuSource;

#[cfg(unix)]
impl CpuUsageSource for RusageCpuSource {
    fn cumulative(&self) -> CpuUsage {
        fn micros(tv: libc::timeval) -> u64 {
            (tv.tv_sec as u64)
                .saturating_mul(1_000_000)
                .saturating_add(tv.tv_usec as u64)
        }

        let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
        // SAFETY: `usage` is a valid, writable rusage buffer for the call.
        let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
        if rc != 0 {
            tracing::warn!(errno = std::io::Error::last_os_error().raw_os_error(), "getrusage failed");
            return CpuUsage::default();
        }
        // SAFETY: getrusage returned 0, so the buffer is initialized.
        let usage = unsafe { usage.assume_init() };
        CpuUsage {
            user_micros: micros(usage.ru_utime),
            system_micros: micros(usage.ru_stime),
        }
    }
}

/// Everything the engine needs from its host, boxed once at construction.
pub struct HostBindings {
    pub clock: Box<dyn Clock>,
    pub scheduler: Box<dyn SchedulerHooks>,
    pub gc: Box<dyn GcHooks>,
    pub heap: Box<dyn HeapIntrospector>,
    pub cpu: Box<dyn CpuUsageSource>,
}

impl HostBindings {
    /// Bindings backed by the current process: a monotonic clock, no-op
    /// hook registration, no heap regions and `getrusage` CPU times.
    #[cfg(unix)]
    pub fn process() -> Self {
        Self {
            clock: Box::new(MonotonicClock::new()),
            scheduler: Box::new(NoopHooks),
            gc: Box::new(NoopHooks),
            heap: Box::new(NoHeap),
            cpu: Box::new(RusageCpuSource),
        }
    }
}

impl std::fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBindings")
            .field("heap_regions", &self.heap.region_count())
            .finish_non_exhaustive()
    }
}
