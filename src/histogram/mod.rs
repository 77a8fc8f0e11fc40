//! Streaming histogram with bounded memory.
//!
//! Keeps exact count/min/max/sum and delegates quantiles to a merging
//! t-digest. Raw samples are never retained.

mod digest;

pub use digest::{TDigest, MIN_COMPRESSION};

use serde::{Deserialize, Serialize};

/// Compression used when no explicit value is configured.
pub const DEFAULT_COMPRESSION: u32 = 1000;

/// Point-in-time view of a histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramSummary {
    pub min: u64,
    pub max: u64,
    pub sum: u64,
    /// `sum / count` with integer division; 0 when empty.
    pub avg: u64,
    pub count: u64,
    pub median: u64,
    pub p95: u64,
}

impl HistogramSummary {
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Count/min/max/sum plus approximate quantiles for a stream of `u64`.
#[derive(Debug, Clone)]
pub struct Histogram {
    min: u64,
    max: u64,
    sum: u64,
    count: u64,
    digest: TDigest,
}

impl Histogram {
    pub fn new() -> Self {
        Self::with_compression(DEFAULT_COMPRESSION)
    }

    /// Create a histogram whose digest uses the given compression.
    pub fn with_compression(compression: u32) -> Self {
        Self {
            min: 0,
            max: 0,
            sum: 0,
            count: 0,
            digest: TDigest::new(compression),
        }
    }

    /// Record one sample.
    pub fn add(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
        self.digest.add(value);
    }

    /// Estimated value at rank `p`. `p` is clamped to `[0, 1]` (NaN reads
    /// as 0). Returns 0 for an empty histogram.
    pub fn percentile(&self, p: f64) -> u64 {
        if self.count == 0 {
            return 0;
        }
        let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        if p == 0.0 {
            return self.min;
        }
        if p == 1.0 {
            return self.max;
        }
        let estimate = self.digest.quantile(p, self.min as f64, self.max as f64);
        (estimate.round() as u64).clamp(self.min, self.max)
    }

    /// Fold another histogram into this one.
    pub fn merge(&mut self, other: &Histogram) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            self.min = other.min;
            self.max = other.max;
        } else {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
        self.count += other.count;
        self.sum = self.sum.saturating_add(other.sum);
        self.digest.merge(&other.digest);
    }

    /// Restore the empty state. Compression is unchanged.
    pub fn reset(&mut self) {
        self.min = 0;
        self.max = 0;
        self.sum = 0;
        self.count = 0;
        self.digest.clear();
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn sum(&self) -> u64 {
        self.sum
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn avg(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.sum / self.count
        }
    }

    pub fn compression(&self) -> u32 {
        self.digest.compression()
    }

    pub fn summary(&self) -> HistogramSummary {
        HistogramSummary {
            min: self.min,
            max: self.max,
            sum: self.sum,
            avg: self.avg(),
            count: self.count,
            median: self.percentile(0.50),
            p95: self.percentile(0.95),
        }
    }

    /// Summarize, then reset. Used by delta-based collectors on dump.
    pub fn take_summary(&mut self) -> HistogramSummary {
        let summary = self.summary();
        self.reset();
        summary
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}
