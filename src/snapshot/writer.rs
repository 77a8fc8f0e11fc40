//! Encoding of a [`Snapshot`] into a boundary-neutral value tree.
//!
//! Labels (GC types, heap region names, span names) are replaced by
//! interned ids, and every encoded tree carries the full id → string table
//! under `strings`. Ids are stable across dumps until the interner is
//! cleared.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use super::interner::StringInterner;
use super::Snapshot;
use crate::collectors::heap::HeapRegion;
use crate::histogram::HistogramSummary;

/// Tagged tree of numbers, strings, lists and maps.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotValue {
    UInt(u64),
    Float(f64),
    Str(String),
    List(Vec<SnapshotValue>),
    /// Ordered key/value pairs.
    Map(Vec<(String, SnapshotValue)>),
}

impl SnapshotValue {
    fn map() -> Self {
        Self::Map(Vec::new())
    }

    fn with(mut self, key: &str, value: impl Into<SnapshotValue>) -> Self {
        if let Self::Map(entries) = &mut self {
            entries.push((key.to_owned(), value.into()));
        }
        self
    }

    /// Map lookup.
    pub fn get(&self, key: &str) -> Option<&SnapshotValue> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::UInt(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SnapshotValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<u64> for SnapshotValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<u32> for SnapshotValue {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<usize> for SnapshotValue {
    fn from(v: usize) -> Self {
        Self::UInt(v as u64)
    }
}

impl From<f64> for SnapshotValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for SnapshotValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<SnapshotValue>> for SnapshotValue {
    fn from(v: Vec<SnapshotValue>) -> Self {
        Self::List(v)
    }
}

impl Serialize for SnapshotValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::UInt(v) => serializer.serialize_u64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Str(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

fn histogram_value(summary: &HistogramSummary) -> SnapshotValue {
    SnapshotValue::map()
        .with("min", summary.min)
        .with("max", summary.max)
        .with("sum", summary.sum)
        .with("avg", summary.avg)
        .with("count", summary.count)
        .with("median", summary.median)
        .with("p95", summary.p95)
}

/// Builds [`SnapshotValue`] trees, owning the label interner.
#[derive(Debug, Default)]
pub struct SnapshotWriter {
    interner: StringInterner,
}

impl SnapshotWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    /// Forget every interned label; ids restart at 0.
    pub fn clear(&mut self) {
        self.interner.clear();
    }

    /// Encode one snapshot.
    pub fn write(&mut self, snapshot: &Snapshot) -> SnapshotValue {
        let gc = snapshot
            .gc
            .iter()
            .map(|(kind, summary)| {
                let id = self.interner.intern(kind.as_str());
                histogram_value(summary).with("type", id)
            })
            .collect::<Vec<_>>();

        let heap = snapshot
            .heap
            .iter()
            .enumerate()
            .map(|(index, region)| match region {
                HeapRegion::Available(stats) => SnapshotValue::map()
                    .with("index", index)
                    .with("name", self.interner.intern(&stats.name))
                    .with("size", stats.size_bytes)
                    .with("used", stats.used_bytes)
                    .with("available", stats.available_bytes)
                    .with("physical_size", stats.physical_size_bytes),
                HeapRegion::Unavailable { index } => SnapshotValue::map().with("index", *index),
            })
            .collect::<Vec<_>>();

        let cpu = SnapshotValue::map()
            .with("user", snapshot.cpu.user_micros)
            .with("system", snapshot.cpu.system_micros)
            .with("elapsed", snapshot.cpu.elapsed_nanos);

        let mut by_name = |counts: &std::collections::BTreeMap<String, u64>| {
            counts
                .iter()
                .map(|(name, count)| {
                    SnapshotValue::map()
                        .with("name", self.interner.intern(name))
                        .with("count", *count)
                })
                .collect::<Vec<_>>()
        };
        let finished = by_name(&snapshot.spans.finished);
        let unfinished = by_name(&snapshot.spans.unfinished);
        let spans = SnapshotValue::map()
            .with("finished_total", snapshot.spans.finished_total)
            .with("unfinished_total", snapshot.spans.unfinished_total)
            .with("finished", finished)
            .with("unfinished", unfinished);

        let strings = self
            .interner
            .strings()
            .iter()
            .cloned()
            .map(SnapshotValue::Str)
            .collect::<Vec<_>>();

        SnapshotValue::map()
            .with("event_loop", histogram_value(&snapshot.event_loop))
            .with(
                "utilization",
                SnapshotValue::map()
                    .with("idle", snapshot.loop_utilization.idle_nanos)
                    .with("active", snapshot.loop_utilization.active_nanos),
            )
            .with("gc", gc)
            .with("heap", heap)
            .with("cpu", cpu)
            .with("spans", spans)
            .with("uptime", snapshot.uptime_nanos)
            .with("strings", strings)
    }
}
