//! Pareto distribution functions.

use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, SimulationResult};

/// Power-law distribution with shape `gamma` and scale `k`.
///
/// Density and cumulative probability are defined for `x >= k`:
/// `pdf(x) = gamma * k^gamma / x^(gamma+1)`, `cdf(x) = 1 - (k/x)^gamma`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pareto {
    gamma: f64,
    k: f64,
}

impl Pareto {
    /// Builds the distribution; both parameters must be positive and
    /// finite.
    pub fn new(gamma: f64, k: f64) -> SimulationResult<Pareto> {
        if !gamma.is_finite() || gamma <= 0.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "pareto shape must be positive and finite, got {gamma}"
            )));
        }
        if !k.is_finite() || k <= 0.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "pareto scale must be positive and finite, got {k}"
            )));
        }
        Ok(Pareto { gamma, k })
    }

    /// The shape parameter.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// The scale (minimum value) parameter.
    pub fn k(&self) -> f64 {
        self.k
    }

    /// Probability density at `x`; `InvalidParameter` below the scale.
    pub fn pdf(&self, x: f64) -> SimulationResult<f64> {
        if x < self.k {
            return Err(SimulationError::InvalidParameter(format!(
                "pareto pdf is undefined below the scale: x={x} < k={}",
                self.k
            )));
        }
        Ok(self.gamma * self.k.powf(self.gamma) / x.powf(self.gamma + 1.0))
    }

    /// Cumulative probability at `x`; `InvalidParameter` below the scale.
    pub fn cdf(&self, x: f64) -> SimulationResult<f64> {
        if x < self.k {
            return Err(SimulationError::InvalidParameter(format!(
                "pareto cdf is undefined below the scale: x={x} < k={}",
                self.k
            )));
        }
        Ok(1.0 - (self.k / x).powf(self.gamma))
    }
}
