//! Aggregate snapshot produced by one dump.

mod interner;
mod writer;

pub use interner::StringInterner;
pub use writer::{SnapshotValue, SnapshotWriter};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::collectors::heap::HeapRegion;
use crate::collectors::{CpuDelta, GcKind, LoopUtilization};
use crate::histogram::HistogramSummary;
use crate::spans::SpanTotals;

/// Immutable result of one dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub event_loop: HistogramSummary,
    pub loop_utilization: LoopUtilization,
    pub gc: BTreeMap<GcKind, HistogramSummary>,
    pub heap: Vec<HeapRegion>,
    pub cpu: CpuDelta,
    pub spans: SpanTotals,
    /// Host clock nanoseconds since the engine was created.
    pub uptime_nanos: u64,
}

impl Snapshot {
    /// GC bucket for `kind`; empty if that type was never seen.
    pub fn gc_bucket(&self, kind: GcKind) -> HistogramSummary {
        self.gc.get(&kind).copied().unwrap_or_default()
    }
}
