//! Running variance.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, SimulationResult};

/// Welford mean plus M2 accumulator. Sample variance (n-1 denominator) is
/// defined from the second sample on; earlier queries report
/// `NotYetDefined`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variance {
    count: u64,
    mean: f64,
    m2: f64,
}

impl Variance {
    /// An empty aggregator.
    pub fn new() -> Variance {
        Variance::default()
    }

    /// Ingests a sample.
    pub fn add(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Number of samples ingested.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The running mean; 0 before the first sample.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance; `NotYetDefined` below two samples.
    pub fn variance(&self) -> SimulationResult<f64> {
        if self.count < 2 {
            return Err(SimulationError::NotYetDefined(format!(
                "variance needs at least 2 samples, have {}",
                self.count
            )));
        }
        Ok(self.m2 / (self.count - 1) as f64)
    }

    /// Sample standard deviation; `NotYetDefined` below two samples.
    pub fn stddev(&self) -> SimulationResult<f64> {
        Ok(self.variance()?.sqrt())
    }

    /// Confidence-interval half-width around the mean, using the
    /// large-sample t approximation. Supported levels are 90, 95 and 99
    /// percent; other levels fall back to 95. `NotYetDefined` below two
    /// samples.
    pub fn confidence(&self, percent: f64) -> SimulationResult<f64> {
        let t = if percent == 90.0 {
            1.645
        } else if percent == 99.0 {
            2.576
        } else {
            1.960
        };
        Ok(t * self.stddev()? / (self.count as f64).sqrt())
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        *self = Variance::default();
    }
}

impl AddAssign<f64> for Variance {
    fn add_assign(&mut self, x: f64) {
        self.add(x);
    }
}
