//! Time-weighted variance.

use serde::{Deserialize, Serialize};

use crate::error::SimulationResult;
use crate::sim::world::Scheduler;
use crate::stats::variance::Variance;

/// Variance weighted by the virtual time spent at each observed value.
///
/// Every [`TimeVariance::record`] folds the previous value's area (value ×
/// elapsed virtual time) into the moment accumulators and starts tracking
/// the new value. The clock is read from the thread's live scheduler; with
/// no scheduler, time reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeVariance {
    dist: Variance,
    current: f64,
    since: f64,
}

fn scheduler_now() -> f64 {
    Scheduler::current().map_or(0.0, |s| s.now().as_f64())
}

impl TimeVariance {
    /// An empty aggregator.
    pub fn new() -> TimeVariance {
        TimeVariance::default()
    }

    /// Records that the observed quantity changed to `value` now.
    pub fn record(&mut self, value: f64) {
        let now = scheduler_now();
        self.dist.add(self.current * (now - self.since));
        self.current = value;
        self.since = now;
    }

    /// Folds the running value's area up to now without changing it. Call
    /// at the end of a run so the final value contributes.
    pub fn finalize(&mut self) {
        let now = scheduler_now();
        self.dist.add(self.current * (now - self.since));
        self.since = now;
    }

    /// The value currently being tracked.
    pub fn current_value(&self) -> f64 {
        self.current
    }

    /// Area accumulated by the current value since it was recorded.
    pub fn area(&self) -> f64 {
        self.current * (scheduler_now() - self.since)
    }

    /// Mean of the recorded areas.
    pub fn mean(&self) -> f64 {
        self.dist.mean()
    }

    /// Sample variance of the recorded areas.
    pub fn variance(&self) -> SimulationResult<f64> {
        self.dist.variance()
    }

    /// Sample standard deviation of the recorded areas.
    pub fn stddev(&self) -> SimulationResult<f64> {
        self.dist.stddev()
    }

    /// Number of recorded updates.
    pub fn count(&self) -> u64 {
        self.dist.count()
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        *self = TimeVariance::default();
    }
}
