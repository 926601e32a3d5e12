//! Error types and utilities for simulation operations.

use thiserror::Error;

use crate::sim::process::ProcessId;

/// The introspectable category of a [`SimulationError`].
///
/// Programmer errors (`InvalidParameter`, `InvalidState`, `BackwardClock`)
/// abort a run when raised from inside a process body; domain errors
/// (`QueueEmpty`, `NotYetDefined`) are reported to the caller and never
/// abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A value outside the operation's domain was supplied.
    InvalidParameter,
    /// An operation was invoked in a state that cannot honor it.
    InvalidState,
    /// An event was scheduled before the current virtual time.
    BackwardClock,
    /// A trigger queue operation found no waiting entity.
    QueueEmpty,
    /// A statistic was queried before enough samples were collected.
    NotYetDefined,
}

/// Errors that can occur during simulation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// A value outside the operation's domain was supplied.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// An operation was invoked in a state that cannot honor it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An event was scheduled before the current virtual time.
    #[error("backward clock: requested t={requested} behind current t={now}")]
    BackwardClock {
        /// The virtual time that was requested.
        requested: f64,
        /// The scheduler clock at the time of the request.
        now: f64,
    },

    /// A trigger queue operation found no waiting entity.
    #[error("trigger queue is empty")]
    QueueEmpty,

    /// A statistic was queried before enough samples were collected.
    #[error("not yet defined: {0}")]
    NotYetDefined(String),

    /// A process body raised a fatal error; the run was aborted.
    ///
    /// Produced only by the scheduler's dispatch loop, wrapping the
    /// underlying error with the process id and virtual time at which the
    /// run died.
    #[error("process {pid} aborted at t={time}: {source}")]
    ProcessAborted {
        /// The process whose body raised the error.
        pid: ProcessId,
        /// The virtual time at which the run aborted.
        time: f64,
        /// The underlying error.
        #[source]
        source: Box<SimulationError>,
    },
}

impl SimulationError {
    /// The introspectable kind of this error.
    ///
    /// [`SimulationError::ProcessAborted`] reports the kind of the error it
    /// wraps.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimulationError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            SimulationError::InvalidState(_) => ErrorKind::InvalidState,
            SimulationError::BackwardClock { .. } => ErrorKind::BackwardClock,
            SimulationError::QueueEmpty => ErrorKind::QueueEmpty,
            SimulationError::NotYetDefined(_) => ErrorKind::NotYetDefined,
            SimulationError::ProcessAborted { source, .. } => source.kind(),
        }
    }
}

/// A type alias for `Result<T, SimulationError>`.
pub type SimulationResult<T> = Result<T, SimulationError>;
