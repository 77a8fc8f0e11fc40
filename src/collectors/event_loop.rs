//! Event-loop latency sampling.
//!
//! Measures wall-clock time with host clock timestamps taken in the
//! prepare (before polling for I/O) and check (after polling) callbacks.
//! Latency for one iteration is the time spent between the previous check
//! and this prepare, plus however long the poll overran the loop's own
//! backend timeout. Waiting out the configured timeout is idle time, not
//! scheduler delay.
//!
//! The same callbacks also split wall time into idle (inside the poll) and
//! active (everything between a check and the next prepare) for the
//! utilization ratio.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::Collector;
use crate::error::{MetricsError, MetricsResult};
use crate::histogram::Histogram;
use crate::host::SchedulerHooks;
use crate::snapshot::Snapshot;

/// Idle and active loop time accumulated since the last dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopUtilization {
    pub idle_nanos: u64,
    pub active_nanos: u64,
}

impl LoopUtilization {
    /// Fraction of loop time spent outside the poll, or `None` before any
    /// iteration completed.
    pub fn ratio(&self) -> Option<f64> {
        let total = self.idle_nanos.saturating_add(self.active_nanos);
        if total == 0 {
            return None;
        }
        Some(self.active_nanos as f64 / total as f64)
    }
}

/// Latency sampler driven by the host's prepare/check callbacks.
pub struct EventLoopSampler {
    hooks: Box<dyn SchedulerHooks>,
    histogram: Histogram,
    utilization: LoopUtilization,
    active: bool,
    check_time: u64,
    prepare_time: Option<u64>,
    /// Backend poll timeout in nanoseconds; `None` means block indefinitely.
    timeout: Option<u64>,
}

impl EventLoopSampler {
    pub fn new(hooks: Box<dyn SchedulerHooks>, compression: u32) -> Self {
        Self {
            hooks,
            histogram: Histogram::with_compression(compression),
            utilization: LoopUtilization::default(),
            active: false,
            check_time: 0,
            prepare_time: None,
            timeout: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Prepare callback: the loop is about to poll with `poll_timeout`.
    pub fn on_prepare(&mut self, now: u64, poll_timeout: Option<Duration>) {
        if !self.active {
            return;
        }
        self.prepare_time = Some(now);
        self.timeout = poll_timeout.map(|t| t.as_nanos().min(u64::MAX as u128) as u64);
    }

    /// Check callback: polling finished. Records one latency sample.
    pub fn on_check(&mut self, now: u64) {
        if !self.active {
            return;
        }
        let Some(prepare_time) = self.prepare_time.take() else {
            return;
        };

        let poll_time = now.saturating_sub(prepare_time);
        let busy = prepare_time.saturating_sub(self.check_time);
        self.utilization.idle_nanos = self.utilization.idle_nanos.saturating_add(poll_time);
        self.utilization.active_nanos = self.utilization.active_nanos.saturating_add(busy);

        let mut latency = busy;
        if let Some(timeout) = self.timeout {
            if poll_time > timeout {
                latency = latency.saturating_add(poll_time - timeout);
            }
        }

        self.histogram.add(latency);
        self.check_time = now;
    }

    /// Accumulated latency samples since the last dump.
    pub fn histogram(&self) -> &Histogram {
        &self.histogram
    }

    /// Idle/active split since the last dump.
    pub fn utilization(&self) -> LoopUtilization {
        self.utilization
    }
}

impl Collector for EventLoopSampler {
    fn name(&self) -> &'static str {
        "event_loop"
    }

    fn start(&mut self, now: u64) -> MetricsResult<()> {
        if self.active {
            tracing::debug!("event loop sampler already started");
            return Ok(());
        }
        self.hooks
            .install()
            .map_err(|reason| MetricsError::HookInstall {
                hook: "scheduler",
                reason,
            })?;
        self.check_time = now;
        self.prepare_time = None;
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            self.hooks.uninstall();
        }
        self.active = false;
        self.prepare_time = None;
        self.histogram.reset();
        self.utilization = LoopUtilization::default();
    }

    fn contribute(&mut self, _now: u64, snapshot: &mut Snapshot) {
        snapshot.event_loop = self.histogram.take_summary();
        snapshot.loop_utilization = std::mem::take(&mut self.utilization);
    }
}

impl std::fmt::Debug for EventLoopSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoopSampler")
            .field("active", &self.active)
            .field("samples", &self.histogram.count())
            .finish()
    }
}
