//! Garbage-collection pause tracking, bucketed by collection type.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Collector;
use crate::error::{MetricsError, MetricsResult};
use crate::histogram::Histogram;
use crate::host::GcHooks;
use crate::snapshot::Snapshot;

/// Deepest begin/end nesting the tracker will attribute.
pub const MAX_GC_NESTING: usize = 8;

/// Collection-cycle type. `All` is the rollup bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcKind {
    Scavenge,
    MinorMarkSweep,
    MarkSweepCompact,
    IncrementalMarking,
    ProcessWeakCallbacks,
    All,
    Unknown,
}

impl GcKind {
    /// Map the host's raw collection-type flag.
    pub fn from_flags(flags: u32) -> Self {
        match flags {
            1 => Self::Scavenge,
            2 => Self::MinorMarkSweep,
            4 => Self::MarkSweepCompact,
            8 => Self::IncrementalMarking,
            16 => Self::ProcessWeakCallbacks,
            31 => Self::All,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scavenge => "scavenge",
            Self::MinorMarkSweep => "minor_mark_sweep",
            Self::MarkSweepCompact => "mark_sweep_compact",
            Self::IncrementalMarking => "incremental_marking",
            Self::ProcessWeakCallbacks => "process_weak_callbacks",
            Self::All => "all",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for GcKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-type pause histograms fed by the host's GC begin/end hooks.
///
/// Begin timestamps go on a bounded stack so properly nested cycles are
/// each attributed to their own type. Overlapping cycles that do not nest
/// cannot be told apart; the host must not produce them.
pub struct GcPauseTracker {
    hooks: Box<dyn GcHooks>,
    compression: u32,
    buckets: BTreeMap<GcKind, Histogram>,
    starts: Vec<u64>,
    /// Begins dropped because the stack was full. Their ends are
    /// swallowed so the stacked starts stay paired with their own ends.
    overflow: usize,
    active: bool,
}

impl GcPauseTracker {
    pub fn new(hooks: Box<dyn GcHooks>, compression: u32) -> Self {
        Self {
            hooks,
            compression,
            buckets: BTreeMap::new(),
            starts: Vec::with_capacity(MAX_GC_NESTING),
            overflow: 0,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// GC prologue.
    pub fn on_gc_begin(&mut self, now: u64) {
        if !self.active {
            return;
        }
        if self.starts.len() >= MAX_GC_NESTING {
            self.overflow += 1;
            tracing::warn!(depth = self.starts.len(), "gc nesting too deep, pause dropped");
            return;
        }
        self.starts.push(now);
    }

    /// GC epilogue for a cycle of type `kind`.
    pub fn on_gc_end(&mut self, now: u64, kind: GcKind) {
        if !self.active {
            return;
        }
        // Innermost cycles end first, so a dropped begin owns this end.
        if self.overflow > 0 {
            self.overflow -= 1;
            return;
        }
        let Some(start) = self.starts.pop() else {
            tracing::warn!(gc_type = %kind, "gc end without matching begin");
            return;
        };

        let pause = now.saturating_sub(start);
        self.bucket(kind).add(pause);
        if kind != GcKind::All {
            self.bucket(GcKind::All).add(pause);
        }
    }

    fn bucket(&mut self, kind: GcKind) -> &mut Histogram {
        let compression = self.compression;
        self.buckets
            .entry(kind)
            .or_insert_with(|| Histogram::with_compression(compression))
    }

    /// Histogram for `kind`, if that type has been seen.
    pub fn histogram(&self, kind: GcKind) -> Option<&Histogram> {
        self.buckets.get(&kind)
    }

    /// Types seen so far.
    pub fn kinds(&self) -> impl Iterator<Item = GcKind> + '_ {
        self.buckets.keys().copied()
    }
}

impl Collector for GcPauseTracker {
    fn name(&self) -> &'static str {
        "gc"
    }

    fn start(&mut self, _now: u64) -> MetricsResult<()> {
        if self.active {
            tracing::debug!("gc tracker already started");
            return Ok(());
        }
        self.hooks.install().map_err(|reason| MetricsError::HookInstall {
            hook: "gc",
            reason,
        })?;
        self.starts.clear();
        self.overflow = 0;
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            self.hooks.uninstall();
        }
        self.active = false;
        self.starts.clear();
        self.overflow = 0;
        self.buckets.values_mut().for_each(Histogram::reset);
    }

    fn contribute(&mut self, _now: u64, snapshot: &mut Snapshot) {
        snapshot.gc = self
            .buckets
            .iter_mut()
            .map(|(kind, histogram)| (*kind, histogram.take_summary()))
            .collect();
    }
}

impl std::fmt::Debug for GcPauseTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcPauseTracker")
            .field("active", &self.active)
            .field("buckets", &self.buckets.len())
            .field("depth", &self.starts.len())
            .field("overflow", &self.overflow)
            .finish()
    }
}
