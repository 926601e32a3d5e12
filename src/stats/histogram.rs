//! Histogram family: fixed bounds, exact buckets, fixed width.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{SimulationError, SimulationResult};
use crate::stats::variance::Variance;

/// Histogram over a fixed, strictly increasing sequence of bucket upper
/// bounds. A sample lands in the first bucket whose upper bound is at
/// least the sample; anything beyond the last bound goes to the overflow
/// bucket. Moments are tracked alongside the counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    bounds: Vec<f64>,
    counts: Vec<u64>,
    overflow: u64,
    dist: Variance,
}

impl Histogram {
    /// Builds a histogram from bucket upper bounds, which must be finite
    /// and strictly increasing.
    pub fn new(bounds: Vec<f64>) -> SimulationResult<Histogram> {
        if bounds.is_empty() {
            return Err(SimulationError::InvalidParameter(
                "histogram needs at least one bucket bound".into(),
            ));
        }
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(SimulationError::InvalidParameter(
                "histogram bounds must be finite".into(),
            ));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SimulationError::InvalidParameter(
                "histogram bounds must be strictly increasing".into(),
            ));
        }
        let counts = vec![0; bounds.len()];
        Ok(Histogram {
            bounds,
            counts,
            overflow: 0,
            dist: Variance::new(),
        })
    }

    /// Ingests a sample.
    pub fn add(&mut self, x: f64) {
        self.dist.add(x);
        let idx = self.bounds.partition_point(|b| *b < x);
        match self.counts.get_mut(idx) {
            Some(count) => *count += 1,
            None => self.overflow += 1,
        }
    }

    /// The bucket upper bounds.
    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Per-bucket counts, parallel to [`Histogram::bounds`].
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Samples beyond the last bound.
    pub fn overflow_count(&self) -> u64 {
        self.overflow
    }

    /// Total samples ingested, overflow included.
    pub fn total(&self) -> u64 {
        self.dist.count()
    }

    /// Mean of all ingested samples.
    pub fn mean(&self) -> f64 {
        self.dist.mean()
    }

    /// Sample variance of all ingested samples.
    pub fn variance(&self) -> SimulationResult<f64> {
        self.dist.variance()
    }

    /// Sample standard deviation of all ingested samples.
    pub fn stddev(&self) -> SimulationResult<f64> {
        self.dist.stddev()
    }

    /// Empties every bucket and the moments; the bounds stay.
    pub fn reset(&mut self) {
        self.counts.fill(0);
        self.overflow = 0;
        self.dist.reset();
    }
}

impl AddAssign<f64> for Histogram {
    fn add_assign(&mut self, x: f64) {
        self.add(x);
    }
}

/// Histogram that grows a bucket per distinct observed value, kept sorted
/// by value. Exact, at the price of O(distinct values) memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrecisionHistogram {
    buckets: Vec<(f64, u64)>,
    dist: Variance,
}

impl PrecisionHistogram {
    /// An empty histogram.
    pub fn new() -> PrecisionHistogram {
        PrecisionHistogram::default()
    }

    /// Ingests a sample, creating its bucket on first sight.
    pub fn add(&mut self, x: f64) {
        self.dist.add(x);
        match self.buckets.binary_search_by(|(b, _)| b.total_cmp(&x)) {
            Ok(i) => self.buckets[i].1 += 1,
            Err(i) => self.buckets.insert(i, (x, 1)),
        }
    }

    /// The `(upper_bound, count)` pairs in ascending bound order.
    pub fn buckets(&self) -> &[(f64, u64)] {
        &self.buckets
    }

    /// Number of distinct values seen.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The count recorded for `value`, if it has a bucket.
    pub fn count_for(&self, value: f64) -> Option<u64> {
        self.buckets
            .binary_search_by(|(b, _)| b.total_cmp(&value))
            .ok()
            .map(|i| self.buckets[i].1)
    }

    /// Total samples ingested.
    pub fn total(&self) -> u64 {
        self.dist.count()
    }

    /// Mean of all ingested samples.
    pub fn mean(&self) -> f64 {
        self.dist.mean()
    }

    /// Sample variance of all ingested samples.
    pub fn variance(&self) -> SimulationResult<f64> {
        self.dist.variance()
    }

    /// Sample standard deviation of all ingested samples.
    pub fn stddev(&self) -> SimulationResult<f64> {
        self.dist.stddev()
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        *self = PrecisionHistogram::default();
    }
}

impl AddAssign<f64> for PrecisionHistogram {
    fn add_assign(&mut self, x: f64) {
        self.add(x);
    }
}

/// Histogram with fixed-width buckets covering `[0, cap]`.
///
/// A sample is attributed to the bucket whose half-open span
/// `(lower, lower + width]` contains it (zero lands in the first bucket);
/// out-of-range samples are logged and dropped. The bucket's lower bound,
/// not the raw sample, feeds the moment accumulators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleHistogram {
    width: f64,
    cap: f64,
    counts: Vec<u64>,
    dist: Variance,
}

impl SimpleHistogram {
    /// Builds the histogram; `width` and `cap` must be positive and
    /// finite.
    pub fn new(width: f64, cap: f64) -> SimulationResult<SimpleHistogram> {
        if !width.is_finite() || width <= 0.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "bucket width must be positive and finite, got {width}"
            )));
        }
        if !cap.is_finite() || cap <= 0.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "histogram cap must be positive and finite, got {cap}"
            )));
        }
        let buckets = (cap / width).ceil().max(1.0) as usize;
        Ok(SimpleHistogram {
            width,
            cap,
            counts: vec![0; buckets],
            dist: Variance::new(),
        })
    }

    /// Ingests a sample; values outside `[0, cap]` are dropped with a
    /// warning.
    pub fn add(&mut self, x: f64) {
        if !x.is_finite() || x < 0.0 || x > self.cap {
            warn!(sample = x, cap = self.cap, "sample outside histogram range, dropped");
            return;
        }
        let idx = if x <= 0.0 {
            0
        } else {
            ((x / self.width).ceil() as usize - 1).min(self.counts.len() - 1)
        };
        self.counts[idx] += 1;
        self.dist.add(idx as f64 * self.width);
    }

    /// The configured bucket width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// The upper end of the covered range.
    pub fn cap(&self) -> f64 {
        self.cap
    }

    /// Per-bucket counts, lowest bucket first.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.counts.len()
    }

    /// Total samples accepted.
    pub fn total(&self) -> u64 {
        self.dist.count()
    }

    /// Mean of the recorded bucket values.
    pub fn mean(&self) -> f64 {
        self.dist.mean()
    }

    /// Sample variance of the recorded bucket values.
    pub fn variance(&self) -> SimulationResult<f64> {
        self.dist.variance()
    }

    /// Empties every bucket and the moments.
    pub fn reset(&mut self) {
        self.counts.fill(0);
        self.dist.reset();
    }
}

impl AddAssign<f64> for SimpleHistogram {
    fn add_assign(&mut self, x: f64) {
        self.add(x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_histogram_places_samples() {
        let mut h = Histogram::new(vec![1.0, 2.0, 5.0]).expect("valid bounds");
        for x in [0.5, 1.0, 1.5, 4.0, 7.0] {
            h += x;
        }
        assert_eq!(h.counts(), &[2, 1, 1]);
        assert_eq!(h.overflow_count(), 1);
        assert_eq!(h.total(), 5);
    }

    #[test]
    fn bounds_must_increase() {
        assert!(Histogram::new(vec![]).is_err());
        assert!(Histogram::new(vec![1.0, 1.0]).is_err());
        assert!(Histogram::new(vec![2.0, 1.0]).is_err());
        assert!(Histogram::new(vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn precision_histogram_grows_sorted() {
        let mut h = PrecisionHistogram::new();
        for x in [3.0, 1.0, 3.0, 2.0, 1.0, 3.0] {
            h += x;
        }
        assert_eq!(h.buckets(), &[(1.0, 2), (2.0, 1), (3.0, 3)]);
        assert_eq!(h.count_for(3.0), Some(3));
        assert_eq!(h.count_for(9.0), None);
        assert_eq!(h.total(), 6);
    }

    #[test]
    fn simple_histogram_buckets_by_width() {
        let mut h = SimpleHistogram::new(2.0, 10.0).expect("valid config");
        assert_eq!(h.bucket_count(), 5);
        for x in [0.0, 1.9, 2.0, 2.1, 10.0] {
            h += x;
        }
        // 0.0, 1.9 and 2.0 share the first span; 2.1 the second; 10.0 the
        // last.
        assert_eq!(h.counts(), &[3, 1, 0, 0, 1]);
        h += -1.0; // dropped
        h += 10.5; // dropped
        assert_eq!(h.total(), 5);
    }
}
