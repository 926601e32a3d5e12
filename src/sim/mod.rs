//! Core simulation engine: scheduler, processes, entities and
//! synchronization.
//!
//! ## Submodules
//!
//! - `world` - Scheduler and WeakScheduler
//! - `process` - Process trait, contexts, handles, suspension futures
//! - `entity` - Entity trait with wait/interrupt/trigger signals
//! - `sync` - Semaphore and TriggerQueue

pub mod entity;
pub mod process;
pub mod sync;
pub mod world;

pub use entity::{Entity, EntityContext, EntityHandle, WaitForFuture, WaitFuture, WaitOutcome};
pub use process::{
    HoldFuture, PassivateFuture, Process, ProcessContext, ProcessHandle, ProcessId, ProcessState,
    TerminateFuture,
};
pub use sync::{AcquireFuture, Semaphore, TriggerQueue, TryAcquire};
pub use world::{Scheduler, WeakScheduler};
