//! Process CPU usage between consecutive dumps.

use serde::{Deserialize, Serialize};

use super::Collector;
use crate::error::MetricsResult;
use crate::host::{CpuUsage, CpuUsageSource};
use crate::snapshot::Snapshot;

/// CPU time consumed since the previous dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuDelta {
    pub user_micros: u64,
    pub system_micros: u64,
    /// Wall-clock time covered by this delta.
    pub elapsed_nanos: u64,
}

impl CpuDelta {
    fn percent(&self, micros: u64) -> f64 {
        if self.elapsed_nanos == 0 {
            return 0.0;
        }
        micros as f64 * 1_000.0 * 100.0 / self.elapsed_nanos as f64
    }

    /// User CPU as a percentage of one core over the elapsed window.
    pub fn user_percent(&self) -> f64 {
        self.percent(self.user_micros)
    }

    pub fn system_percent(&self) -> f64 {
        self.percent(self.system_micros)
    }

    pub fn total_percent(&self) -> f64 {
        self.user_percent() + self.system_percent()
    }
}

struct Baseline {
    usage: CpuUsage,
    taken_at: u64,
}

/// Delta sampler over cumulative process CPU time.
pub struct ProcessUsageSampler {
    source: Box<dyn CpuUsageSource>,
    baseline: Option<Baseline>,
}

impl ProcessUsageSampler {
    pub fn new(source: Box<dyn CpuUsageSource>) -> Self {
        Self {
            source,
            baseline: None,
        }
    }

    /// Delta since the stored baseline; `current` becomes the new baseline.
    pub fn sample(&mut self, now: u64) -> CpuDelta {
        let current = self.source.cumulative();
        let delta = match &self.baseline {
            Some(base) => {
                if current.user_micros < base.usage.user_micros
                    || current.system_micros < base.usage.system_micros
                {
                    tracing::warn!("cumulative cpu usage went backwards");
                }
                CpuDelta {
                    user_micros: current.user_micros.saturating_sub(base.usage.user_micros),
                    system_micros: current.system_micros.saturating_sub(base.usage.system_micros),
                    elapsed_nanos: now.saturating_sub(base.taken_at),
                }
            }
            None => CpuDelta::default(),
        };
        self.baseline = Some(Baseline {
            usage: current,
            taken_at: now,
        });
        delta
    }
}

impl Collector for ProcessUsageSampler {
    fn name(&self) -> &'static str {
        "process"
    }

    fn start(&mut self, now: u64) -> MetricsResult<()> {
        self.baseline = Some(Baseline {
            usage: self.source.cumulative(),
            taken_at: now,
        });
        Ok(())
    }

    fn stop(&mut self) {
        self.baseline = None;
    }

    fn contribute(&mut self, now: u64, snapshot: &mut Snapshot) {
        snapshot.cpu = self.sample(now);
    }
}

impl std::fmt::Debug for ProcessUsageSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessUsageSampler")
            .field("has_baseline", &self.baseline.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentages() {
        let delta = CpuDelta {
            user_micros: 250_000,
            system_micros: 50_000,
            elapsed_nanos: 1_000_000_000,
        };
        assert!((delta.user_percent() - 25.0).abs() < 1e-9);
        assert!((delta.system_percent() - 5.0).abs() < 1e-9);
        assert!((delta.total_percent() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_elapsed_reads_zero_percent() {
        let delta = CpuDelta {
            user_micros: 10,
            system_micros: 10,
            elapsed_nanos: 0,
        };
        assert_eq!(delta.total_percent(), 0.0);
    }
}
