//! Samplers that feed the aggregate snapshot.
//!
//! Every collector shares one lifecycle: `start` when the engine is
//! enabled, `stop` when it is disabled, and `contribute` on each dump. Each
//! one writes a disjoint part of the [`Snapshot`], so the order the engine
//! walks them in does not matter.

pub mod event_loop;
pub mod gc;
pub mod heap;
pub mod process;

pub use event_loop::{EventLoopSampler, LoopUtilization};
pub use gc::{GcKind, GcPauseTracker, MAX_GC_NESTING};
pub use heap::HeapSnapshotReader;
pub use process::{CpuDelta, ProcessUsageSampler};

use crate::error::MetricsResult;
use crate::snapshot::Snapshot;

/// Uniform lifecycle shared by all samplers.
pub trait Collector: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Begin sampling. `now` is the host clock in nanoseconds.
    fn start(&mut self, now: u64) -> MetricsResult<()>;

    /// Stop sampling and drop accumulated state.
    fn stop(&mut self);

    /// Write this collector's part of the snapshot, resetting any
    /// delta-based state.
    fn contribute(&mut self, now: u64, snapshot: &mut Snapshot);
}
