//! Merging t-digest used for approximate quantiles.
//!
//! Incoming values are buffered and folded into a sorted centroid list once
//! the buffer fills. Merging is limited by the k1 (arcsine) scale function,
//! so the centroid count stays at most `compression + 1` no matter how many
//! values are added, while the tails keep small (accurate) centroids.

use std::cmp::Ordering;

/// Smallest accepted compression. Lower values are raised to this.
pub const MIN_COMPRESSION: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Centroid {
    mean: f64,
    weight: f64,
}

impl Centroid {
    fn new(mean: f64, weight: f64) -> Self {
        Self { mean, weight }
    }

    fn absorb(&mut self, other: &Centroid) {
        let total = self.weight + other.weight;
        if total > 0.0 {
            self.mean = (self.mean * self.weight + other.mean * other.weight) / total;
            self.weight = total;
        }
    }
}

fn by_mean(a: &Centroid, b: &Centroid) -> Ordering {
    a.mean.partial_cmp(&b.mean).unwrap_or(Ordering::Equal)
}

/// Bounded-size quantile digest.
#[derive(Debug, Clone)]
pub struct TDigest {
    compression: u32,
    centroids: Vec<Centroid>,
    buffer: Vec<f64>,
    total_weight: f64,
}

impl TDigest {
    /// Create an empty digest. `compression` trades memory for accuracy.
    pub fn new(compression: u32) -> Self {
        let compression = compression.max(MIN_COMPRESSION);
        Self {
            compression,
            centroids: Vec::new(),
            buffer: Vec::with_capacity(Self::buffer_capacity_for(compression)),
            total_weight: 0.0,
        }
    }

    fn buffer_capacity_for(compression: u32) -> usize {
        compression as usize * 2
    }

    /// Configured compression.
    pub fn compression(&self) -> u32 {
        self.compression
    }

    /// Number of values folded in, buffered ones included.
    pub fn count(&self) -> u64 {
        self.total_weight as u64
    }

    /// Number of centroids after the last compression pass.
    pub fn centroid_count(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight == 0.0
    }

    /// Add one value.
    pub fn add(&mut self, value: u64) {
        self.buffer.push(value as f64);
        self.total_weight += 1.0;
        if self.buffer.len() >= Self::buffer_capacity_for(self.compression) {
            self.flush();
        }
    }

    /// Fold the pending buffer into the centroid list.
    pub fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut all = std::mem::take(&mut self.centroids);
        all.extend(self.buffer.drain(..).map(|v| Centroid::new(v, 1.0)));
        all.sort_by(by_mean);
        self.centroids = self.compress(all);
    }

    /// Fold another digest into this one.
    pub fn merge(&mut self, other: &TDigest) {
        if other.is_empty() {
            return;
        }
        let mut all = std::mem::take(&mut self.centroids);
        all.extend(self.buffer.drain(..).map(|v| Centroid::new(v, 1.0)));
        all.extend_from_slice(&other.centroids);
        all.extend(other.buffer.iter().map(|&v| Centroid::new(v, 1.0)));
        self.total_weight += other.total_weight;
        all.sort_by(by_mean);
        self.centroids = self.compress(all);
    }

    /// Drop all state but keep the configured compression.
    pub fn clear(&mut self) {
        self.centroids.clear();
        self.buffer.clear();
        self.total_weight = 0.0;
    }

    /// k1 scale function: maps a rank to the "k-space" where every
    /// centroid may span at most one unit.
    fn scale(&self, q: f64) -> f64 {
        let q = q.clamp(0.0, 1.0);
        self.compression as f64 / (2.0 * std::f64::consts::PI) * (2.0 * q - 1.0).asin()
    }

    fn compress(&self, sorted: Vec<Centroid>) -> Vec<Centroid> {
        let mut iter = sorted.into_iter();
        let Some(mut current) = iter.next() else {
            return Vec::new();
        };

        let total = self.total_weight;
        let mut out = Vec::with_capacity(self.compression as usize);
        let mut weight_so_far = 0.0;
        let mut k_lower = self.scale(0.0);
        for next in iter {
            let q_right = (weight_so_far + current.weight + next.weight) / total;
            if self.scale(q_right) - k_lower <= 1.0 {
                current.absorb(&next);
            } else {
                weight_so_far += current.weight;
                k_lower = self.scale(weight_so_far / total);
                out.push(current);
                current = next;
            }
        }
        out.push(current);
        out
    }

    /// Estimate the value at rank `q` (already clamped to `(0, 1)` by the
    /// caller). `min`/`max` are the exact stream extremes and bound the
    /// interpolation at both tails.
    ///
    /// Pending buffered values are included without mutating the digest.
    pub fn quantile(&self, q: f64, min: f64, max: f64) -> f64 {
        if self.is_empty() {
            return 0.0;
        }

        let pending;
        let centroids: &[Centroid] = if self.buffer.is_empty() {
            &self.centroids
        } else {
            let mut all = self.centroids.clone();
            all.extend(self.buffer.iter().map(|&v| Centroid::new(v, 1.0)));
            all.sort_by(by_mean);
            pending = all;
            &pending
        };

        let total: f64 = centroids.iter().map(|c| c.weight).sum();
        let target = q * total;

        let first = centroids[0];
        if target < first.weight / 2.0 {
            let frac = if first.weight > 0.0 { target / (first.weight / 2.0) } else { 0.0 };
            return (min + frac * (first.mean - min)).clamp(min, max);
        }

        let last = centroids[centroids.len() - 1];
        if target > total - last.weight / 2.0 {
            let tail = last.weight / 2.0;
            let frac = if tail > 0.0 { (target - (total - tail)) / tail } else { 1.0 };
            return (last.mean + frac * (max - last.mean)).clamp(min, max);
        }

        // Each centroid's mean sits at the midpoint of its cumulative weight;
        // interpolate between the two centers that bracket the target.
        let mut cumulative = 0.0;
        for pair in centroids.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            let left_center = cumulative + left.weight / 2.0;
            let right_center = cumulative + left.weight + right.weight / 2.0;
            if target <= right_center {
                let span = right_center - left_center;
                let frac = if span > 0.0 { (target - left_center) / span } else { 0.0 };
                return (left.mean + frac * (right.mean - left.mean)).clamp(min, max);
            }
            cumulative += left.weight;
        }

        last.mean.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_floor() {
        assert_eq!(TDigest::new(0).compression(), MIN_COMPRESSION);
        assert_eq!(TDigest::new(500).compression(), 500);
    }

    #[test]
    fn test_flush_preserves_weight() {
        let mut digest = TDigest::new(20);
        for v in 0..1_000u64 {
            digest.add(v);
        }
        digest.flush();
        assert_eq!(digest.count(), 1_000);
        assert!(digest.buffer.is_empty());
        let weight: f64 = digest.centroids.iter().map(|c| c.weight).sum();
        assert_eq!(weight, 1_000.0);
    }

    #[test]
    fn test_centroid_count_stays_bounded() {
        let mut digest = TDigest::new(50);
        for v in 0..200_000u64 {
            digest.add(v % 977);
        }
        digest.flush();
        assert!(
            digest.centroid_count() <= 50 + 1,
            "centroids grew to {}",
            digest.centroid_count()
        );
    }

    #[test]
    fn test_centroids_sorted_after_flush() {
        let mut digest = TDigest::new(10);
        for v in [9u64, 1, 7, 3, 5, 2, 8, 4, 6, 0].iter().cycle().take(500) {
            digest.add(*v);
        }
        digest.flush();
        assert!(digest.centroids.windows(2).all(|w| w[0].mean <= w[1].mean));
    }

    #[test]
    fn test_quantile_reads_pending_buffer() {
        let mut digest = TDigest::new(1000);
        digest.add(1);
        digest.add(2);
        digest.add(3);
        assert!(digest.centroids.is_empty());
        assert_eq!(digest.quantile(0.5, 1.0, 3.0), 2.0);
    }

    #[test]
    fn test_clear_keeps_compression() {
        let mut digest = TDigest::new(64);
        digest.add(10);
        digest.clear();
        assert!(digest.is_empty());
        assert_eq!(digest.compression(), 64);
        assert_eq!(digest.quantile(0.5, 0.0, 0.0), 0.0);
    }
}
