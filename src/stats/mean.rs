//! Running mean.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Welford running mean: O(1) state, numerically stable regardless of
/// sample order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mean {
    count: u64,
    mean: f64,
}

impl Mean {
    /// An empty aggregator.
    pub fn new() -> Mean {
        Mean::default()
    }

    /// Ingests a sample.
    pub fn add(&mut self, x: f64) {
        self.count += 1;
        self.mean += (x - self.mean) / self.count as f64;
    }

    /// Number of samples ingested.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The running mean; 0 before the first sample.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        *self = Mean::default();
    }
}

impl AddAssign<f64> for Mean {
    fn add_assign(&mut self, x: f64) {
        self.add(x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_the_mean() {
        let mut m = Mean::new();
        for x in [2.0, 4.0, 6.0] {
            m += x;
        }
        assert_eq!(m.count(), 3);
        assert!((m.mean() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn empty_reads_zero() {
        let m = Mean::new();
        assert_eq!(m.count(), 0);
        assert_eq!(m.mean(), 0.0);
    }

    #[test]
    fn reset_forgets() {
        let mut m = Mean::new();
        m += 10.0;
        m.reset();
        assert_eq!(m.count(), 0);
        assert_eq!(m.mean(), 0.0);
    }
}
