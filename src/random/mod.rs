//! Reproducible random numbers: the Wichmann–Hill substrate and the
//! variate streams built on it.
//!
//! ## Submodules
//!
//! - `prng` - the combined generator, seed triples and the seed cache
//! - `streams` - uniform, exponential, normal, Erlang, hyperexponential,
//!   triangular and Bernoulli streams

pub mod prng;
pub mod streams;

pub use prng::{Seeds, WichmannHill, reset_prng_cache};
pub use streams::{
    Draw, ErlangStream, ExponentialStream, HyperExponentialStream, NormalStream, TriangularStream,
    UniformStream,
};
