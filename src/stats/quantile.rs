//! Quantile estimation over exact buckets.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, SimulationResult};
use crate::stats::histogram::PrecisionHistogram;

/// Estimates the q-quantile by scanning a [`PrecisionHistogram`]'s
/// cumulative counts up to the q·N-th sample and reporting that bucket's
/// bound. No interpolation inside the bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantile {
    q: f64,
    hist: PrecisionHistogram,
}

impl Quantile {
    /// Builds an estimator for the `q`-quantile, 0 < q < 1.
    pub fn new(q: f64) -> SimulationResult<Quantile> {
        if !q.is_finite() || q <= 0.0 || q >= 1.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "quantile requires 0 < q < 1, got {q}"
            )));
        }
        Ok(Quantile {
            q,
            hist: PrecisionHistogram::new(),
        })
    }

    /// Ingests a sample.
    pub fn add(&mut self, x: f64) {
        self.hist.add(x);
    }

    /// The quantile being estimated.
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Number of samples ingested.
    pub fn count(&self) -> u64 {
        self.hist.total()
    }

    /// The bound of the bucket containing the q·N-th sample;
    /// `NotYetDefined` with no samples.
    pub fn value(&self) -> SimulationResult<f64> {
        let total = self.hist.total();
        if total == 0 {
            return Err(SimulationError::NotYetDefined(
                "quantile of an empty sample set".into(),
            ));
        }
        let target = total as f64 * self.q;
        let mut seen = 0u64;
        let mut bound = 0.0;
        for (b, count) in self.hist.buckets() {
            seen += count;
            bound = *b;
            if seen as f64 >= target {
                break;
            }
        }
        Ok(bound)
    }

    /// The backing histogram.
    pub fn histogram(&self) -> &PrecisionHistogram {
        &self.hist
    }

    /// Forgets all samples; `q` stays.
    pub fn reset(&mut self) {
        self.hist.reset();
    }
}

impl AddAssign<f64> for Quantile {
    fn add_assign(&mut self, x: f64) {
        self.add(x);
    }
}
