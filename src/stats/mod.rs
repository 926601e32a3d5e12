//! Online statistics aggregators.
//!
//! All aggregators ingest through `add` or `+=`, keep O(1) state (the
//! histograms keep O(buckets)), and serialize through serde so collected
//! statistics can be persisted by embedders.
//!
//! ## Submodules
//!
//! - `mean` - Welford running mean
//! - `variance` - Welford mean + M2
//! - `histogram` - bounded, exact and fixed-width histograms
//! - `quantile` - quantile over exact buckets
//! - `time_variance` - variance weighted by virtual time
//! - `pareto` - Pareto density and cumulative probability

pub mod histogram;
pub mod mean;
pub mod pareto;
pub mod quantile;
pub mod time_variance;
pub mod variance;

pub use histogram::{Histogram, PrecisionHistogram, SimpleHistogram};
pub use mean::Mean;
pub use pareto::Pareto;
pub use quantile::Quantile;
pub use time_variance::TimeVariance;
pub use variance::Variance;
