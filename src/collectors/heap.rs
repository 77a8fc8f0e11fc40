//! Heap region enumeration.

use serde::{Deserialize, Serialize};

use super::Collector;
use crate::error::MetricsResult;
use crate::host::{HeapIntrospector, HeapRegionStats};
use crate::snapshot::Snapshot;

/// One entry of the heap listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HeapRegion {
    Available(HeapRegionStats),
    /// The host could not report this region; the rest of the listing is
    /// still valid.
    Unavailable { index: usize },
}

impl HeapRegion {
    pub fn stats(&self) -> Option<&HeapRegionStats> {
        match self {
            Self::Available(stats) => Some(stats),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Stateless reader over the host's heap introspection.
pub struct HeapSnapshotReader {
    introspector: Box<dyn HeapIntrospector>,
}

impl HeapSnapshotReader {
    pub fn new(introspector: Box<dyn HeapIntrospector>) -> Self {
        Self { introspector }
    }

    /// Read every region in host order.
    pub fn read(&self) -> Vec<HeapRegion> {
        let count = self.introspector.region_count();
        (0..count)
            .map(|index| match self.introspector.region(index) {
                Some(stats) => HeapRegion::Available(stats),
                None => {
                    tracing::debug!(index, "heap region unavailable");
                    HeapRegion::Unavailable { index }
                }
            })
            .collect()
    }
}

impl Collector for HeapSnapshotReader {
    fn name(&self) -> &'static str {
        "heap"
    }

    fn start(&mut self, _now: u64) -> MetricsResult<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn contribute(&mut self, _now: u64, snapshot: &mut Snapshot) {
        snapshot.heap = self.read();
    }
}

impl std::fmt::Debug for HeapSnapshotReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapSnapshotReader").finish_non_exhaustive()
    }
}
