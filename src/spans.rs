//! Span lifecycle accounting.
//!
//! Counts in-flight (unfinished) and finished logical operations per name.
//! Callers never have to release tracking explicitly: a [`SpanHandle`] is
//! stored alongside the object it describes, and dropping it is the
//! finalization signal. The handle only holds a `Weak` link to the tracker,
//! so an abandoned handle never keeps the tracker alive and a dropped
//! tracker makes every outstanding handle inert.
//!
//! Each handle remembers the tracker generation it was created in. Stopping
//! the tracker clears the counters and bumps the generation, so handles
//! finalized afterwards are ignored instead of being subtracted from the
//! fresh zero state.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::collectors::Collector;
use crate::error::MetricsResult;
use crate::snapshot::Snapshot;

/// Span counters as reported in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanTotals {
    pub finished_total: u64,
    pub unfinished_total: u64,
    pub finished: BTreeMap<String, u64>,
    pub unfinished: BTreeMap<String, u64>,
}

impl SpanTotals {
    /// Finished count for `name`; 0 when never seen.
    pub fn finished(&self, name: &str) -> u64 {
        self.finished.get(name).copied().unwrap_or(0)
    }

    /// Unfinished count for `name`; 0 when never seen.
    pub fn unfinished(&self, name: &str) -> u64 {
        self.unfinished.get(name).copied().unwrap_or(0)
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    active: bool,
    generation: u64,
    finished_total: u64,
    unfinished_total: u64,
    finished: HashMap<Arc<str>, u64>,
    unfinished: HashMap<Arc<str>, u64>,
}

/// Decrement a counter that must never go negative.
///
/// Hitting zero here means the bookkeeping is wrong: fatal in debug builds,
/// clamped and logged in release builds.
fn decrement(counter: &mut u64, counter_name: &'static str, span_name: &str) {
    debug_assert!(*counter > 0, "{counter_name} count for {span_name:?} would go negative");
    if *counter == 0 {
        tracing::error!(counter = counter_name, span = span_name, "span counter underflow");
        return;
    }
    *counter -= 1;
}

impl TrackerState {
    fn key(&self, name: &str) -> Arc<str> {
        self.unfinished
            .get_key_value(name)
            .or_else(|| self.finished.get_key_value(name))
            .map(|(k, _)| Arc::clone(k))
            .unwrap_or_else(|| Arc::from(name))
    }

    fn open(&mut self, name: &Arc<str>) {
        self.unfinished_total += 1;
        *self.unfinished.entry(Arc::clone(name)).or_insert(0) += 1;
    }

    fn close(&mut self, name: &Arc<str>) {
        decrement(&mut self.unfinished_total, "unfinished_total", name);
        if let Some(count) = self.unfinished.get_mut(name.as_ref()) {
            decrement(count, "unfinished", name);
        } else {
            decrement(&mut 0, "unfinished", name);
        }
        self.finished_total += 1;
        *self.finished.entry(Arc::clone(name)).or_insert(0) += 1;
    }

    fn release(&mut self, name: &str, finished: bool) {
        let (total, per_name, label) = if finished {
            (&mut self.finished_total, &mut self.finished, "finished")
        } else {
            (&mut self.unfinished_total, &mut self.unfinished, "unfinished")
        };
        decrement(total, label, name);
        match per_name.get_mut(name) {
            Some(count) => decrement(count, label, name),
            None => decrement(&mut 0, label, name),
        }
    }

    fn reset(&mut self) {
        self.finished_total = 0;
        self.unfinished_total = 0;
        self.finished.clear();
        self.unfinished.clear();
    }

    fn totals(&self) -> SpanTotals {
        let collect = |map: &HashMap<Arc<str>, u64>| {
            map.iter()
                .map(|(name, count)| (name.to_string(), *count))
                .collect::<BTreeMap<_, _>>()
        };
        SpanTotals {
            finished_total: self.finished_total,
            unfinished_total: self.unfinished_total,
            finished: collect(&self.finished),
            unfinished: collect(&self.unfinished),
        }
    }
}

struct SpanLink {
    tracker: Weak<Mutex<TrackerState>>,
    name: Arc<str>,
    generation: u64,
    finished: bool,
}

/// Tracking token for one operation. Dropping it is the finalization
/// signal.
pub struct SpanHandle {
    link: Option<SpanLink>,
}

impl SpanHandle {
    fn inert() -> Self {
        Self { link: None }
    }

    /// True when created while tracking was disabled; such a handle has no
    /// effect at all.
    pub fn is_inert(&self) -> bool {
        self.link.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.link.as_ref().is_some_and(|link| link.finished)
    }

    /// Operation name, unless inert.
    pub fn name(&self) -> Option<&str> {
        self.link.as_ref().map(|link| link.name.as_ref())
    }

    /// Mark the operation complete. Repeated calls are ignored.
    pub fn finish(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        if link.finished {
            tracing::debug!(span = %link.name, "span already finished");
            return;
        }
        let Some(tracker) = link.tracker.upgrade() else {
            return;
        };
        let mut state = tracker.lock();
        if !state.active || state.generation != link.generation {
            return;
        }
        state.close(&link.name);
        link.finished = true;
    }
}

impl Drop for SpanHandle {
    fn drop(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        let Some(tracker) = link.tracker.upgrade() else {
            return;
        };
        let mut state = tracker.lock();
        if state.generation != link.generation {
            return;
        }
        state.release(&link.name, link.finished);
    }
}

impl std::fmt::Debug for SpanHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.link {
            Some(link) => f
                .debug_struct("SpanHandle")
                .field("name", &link.name)
                .field("generation", &link.generation)
                .field("finished", &link.finished)
                .finish(),
            None => f.write_str("SpanHandle(inert)"),
        }
    }
}

/// Per-name counts of in-flight and finished operations.
pub struct SpanTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl SpanTracker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState::default())),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Begin tracking one operation. Returns an inert handle when tracking
    /// is disabled.
    pub fn track(&self, name: &str) -> SpanHandle {
        let mut state = self.state.lock();
        if !state.active {
            return SpanHandle::inert();
        }
        let key = state.key(name);
        state.open(&key);
        SpanHandle {
            link: Some(SpanLink {
                tracker: Arc::downgrade(&self.state),
                name: key,
                generation: state.generation,
                finished: false,
            }),
        }
    }

    /// Mark `handle` complete. Equivalent to [`SpanHandle::finish`].
    pub fn finish(&self, handle: &mut SpanHandle) {
        handle.finish();
    }

    /// Current counters.
    pub fn totals(&self) -> SpanTotals {
        self.state.lock().totals()
    }
}

impl Default for SpanTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for SpanTracker {
    fn name(&self) -> &'static str {
        "spans"
    }

    fn start(&mut self, _now: u64) -> MetricsResult<()> {
        self.state.lock().active = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.active = false;
        state.generation += 1;
        state.reset();
    }

    fn contribute(&mut self, _now: u64, snapshot: &mut Snapshot) {
        snapshot.spans = self.totals();
    }
}

impl std::fmt::Debug for SpanTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SpanTracker")
            .field("active", &state.active)
            .field("generation", &state.generation)
            .field("finished_total", &state.finished_total)
            .field("unfinished_total", &state.unfinished_total)
            .finish()
    }
}
