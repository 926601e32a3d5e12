//! # chronosim
//!
//! A discrete-event simulation kernel in the SIMULA tradition: cooperative
//! processes advance a virtual clock, synchronize through semaphores and
//! one-shot signals, draw from bit-reproducible random streams and feed
//! online statistics.
//!
//! ## Key properties
//!
//! - **Strictly sequential in virtual time**: one process runs at a time;
//!   same-time events fire in insertion order.
//! - **Deterministic randomness**: the Wichmann–Hill streams reproduce
//!   the same sequence bit for bit from a seed triple, on every platform.
//! - **Typed failure modes**: programmer errors abort the run with the
//!   offending process and time; domain errors are ordinary results.
//!
//! ## Getting started
//!
//! ```ignore
//! use chronosim::{Process, ProcessContext, Scheduler, SimulationResult};
//!
//! struct Ticker;
//!
//! #[async_trait::async_trait(?Send)]
//! impl Process for Ticker {
//!     async fn body(self: Box<Self>, ctx: ProcessContext) -> SimulationResult<()> {
//!         ctx.hold(1.0).await?;
//!         println!("tick at {}", ctx.now());
//!         Ok(())
//!     }
//! }
//!
//! let sim = Scheduler::create()?;
//! sim.register(Ticker).activate()?;
//! sim.run()?;
//! sim.terminate();
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// =============================================================================
// Core Modules
// =============================================================================

/// Core simulation engine: scheduler, processes, entities, synchronization.
pub mod sim;

/// Activation records and the event queue.
pub mod events;

/// SIMSET-style intrusive doubly-linked lists.
pub mod simset;

/// Virtual time for the simulation clock.
pub mod time;

/// Error types and utilities for simulation operations.
pub mod error;

// =============================================================================
// Substrate Modules
// =============================================================================

/// Reproducible random number streams.
pub mod random;

/// Online statistics aggregators.
pub mod stats;

// =============================================================================
// Public API Re-exports
// =============================================================================

// Error types
pub use error::{ErrorKind, SimulationError, SimulationResult};

// Time
pub use time::VirtualTime;

// Sim module re-exports
pub use sim::{
    Entity, EntityContext, EntityHandle, Process, ProcessContext, ProcessHandle, ProcessId,
    ProcessState, Scheduler, Semaphore, TriggerQueue, TryAcquire, WaitOutcome, WeakScheduler,
};

// Event queue re-exports
pub use events::{EventQueue, EventRecord};

// SIMSET re-exports
pub use simset::{Head, Link};

// Random re-exports
pub use random::{
    Draw, ErlangStream, ExponentialStream, HyperExponentialStream, NormalStream, Seeds,
    TriangularStream, UniformStream, WichmannHill, reset_prng_cache,
};

// Statistics re-exports
pub use stats::{
    Histogram, Mean, Pareto, PrecisionHistogram, Quantile, SimpleHistogram, TimeVariance, Variance,
};
