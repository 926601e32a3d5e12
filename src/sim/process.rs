//! The cooperative process model.
//!
//! A [`Process`] is an independently-scheduled entity whose `body` is an
//! async routine. Suspension points are exactly the futures handed out by
//! [`ProcessContext`]; the scheduler polls one body at a time, so a body
//! runs uninterrupted between suspension points.
//!
//! The futures follow the schedule → wait → complete shape: the first poll
//! performs the scheduling side effect and parks the process, the second
//! poll (which only ever happens when the scheduler dispatches this
//! process again) completes.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;

use crate::error::{SimulationError, SimulationResult};
use crate::sim::world::{Scheduler, WeakScheduler};
use crate::time::VirtualTime;

/// Stable identity of a process, assigned at registration.
///
/// Ids are unique within a scheduler and never reused during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId(u64);

impl ProcessId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        ProcessId(raw)
    }

    /// The raw numeric id.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Registered but never scheduled, or passivated without a record.
    Idle,
    /// Holds exactly one activation record in the event queue.
    Scheduled,
    /// The process currently dispatched; at most one per scheduler.
    Running,
    /// Suspended with no scheduled resumption (a `wait_for` keeps its
    /// bound timeout record).
    Waiting,
    /// Finished; never re-enters any other state.
    Terminated,
}

/// A simulation process.
///
/// Implementors put their whole behavior in `body`; it runs when the
/// process is first dispatched and owns the object for the rest of the
/// run. Returning `Ok(())` terminates the process normally; returning an
/// error aborts the entire run with diagnostic context.
#[async_trait(?Send)]
pub trait Process: 'static {
    /// The process behavior, suspended only through `ctx`.
    async fn body(self: Box<Self>, ctx: ProcessContext) -> SimulationResult<()>;
}

/// Capabilities available to a process from inside its own body.
#[derive(Clone)]
pub struct ProcessContext {
    sim: WeakScheduler,
    pid: ProcessId,
}

impl ProcessContext {
    pub(crate) fn new(sim: WeakScheduler, pid: ProcessId) -> Self {
        ProcessContext { sim, pid }
    }

    /// This process's id.
    pub fn id(&self) -> ProcessId {
        self.pid
    }

    /// The scheduler's current virtual time, or zero after teardown.
    pub fn now(&self) -> VirtualTime {
        self.sim
            .upgrade()
            .map(|sim| sim.now())
            .unwrap_or(VirtualTime::ZERO)
    }

    /// The owning scheduler, for registering child processes or building
    /// synchronization objects from inside a body.
    pub fn scheduler(&self) -> SimulationResult<Scheduler> {
        self.sim.upgrade()
    }

    /// Suspends for `dt` units of virtual time.
    ///
    /// Fatal `InvalidParameter` if `dt` is negative or not finite.
    pub fn hold(&self, dt: f64) -> HoldFuture {
        HoldFuture {
            sim: self.sim.clone(),
            pid: self.pid,
            dt,
            parked: false,
        }
    }

    /// Suspends with no scheduled resumption; only an external
    /// `activate*`, `trigger` or `interrupt` wakes the process again.
    pub fn passivate(&self) -> PassivateFuture {
        PassivateFuture {
            sim: self.sim.clone(),
            pid: self.pid,
            parked: false,
        }
    }

    /// Terminates this process from inside its own body. The returned
    /// future never resolves: the scheduler drops the body at the next
    /// suspension point and the process never resumes.
    pub fn terminate(&self) -> TerminateFuture {
        TerminateFuture {
            sim: self.sim.clone(),
            pid: self.pid,
        }
    }

    pub(crate) fn sim(&self) -> &WeakScheduler {
        &self.sim
    }
}

/// External handle to a registered process.
///
/// Cloneable; all scheduling operations on another process go through its
/// handle. Suspension is not available here — only the owning body can
/// suspend, through its [`ProcessContext`].
#[derive(Clone)]
pub struct ProcessHandle {
    sim: WeakScheduler,
    pid: ProcessId,
}

impl ProcessHandle {
    pub(crate) fn new(sim: WeakScheduler, pid: ProcessId) -> Self {
        ProcessHandle { sim, pid }
    }

    /// The process id.
    pub fn id(&self) -> ProcessId {
        self.pid
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SimulationResult<ProcessState> {
        self.sim.upgrade()?.state_of(self.pid)
    }

    /// Schedules the process at the current time when it is Idle or
    /// Waiting. No effect when already Scheduled or Running; fatal
    /// `InvalidState` on a Terminated process.
    pub fn activate(&self) -> SimulationResult<()> {
        self.sim.upgrade()?.activate_now(self.pid)
    }

    /// Schedules the process at absolute time `t`, rescheduling if a
    /// record is already pending. `BackwardClock` if `t` lies before the
    /// current time.
    pub fn activate_at(&self, t: f64) -> SimulationResult<()> {
        self.sim.upgrade()?.activate_at(self.pid, t)
    }

    /// Equivalent to `activate_at(now + dt)`; `InvalidParameter` for a
    /// negative or non-finite delay.
    pub fn activate_delay(&self, dt: f64) -> SimulationResult<()> {
        self.sim.upgrade()?.activate_delay(self.pid, dt)
    }

    /// Removes any pending record and marks the process Terminated.
    /// `InvalidState` when it already terminated.
    pub fn terminate_process(&self) -> SimulationResult<()> {
        self.sim.upgrade()?.terminate_external(self.pid)
    }

    pub(crate) fn sim(&self) -> &WeakScheduler {
        &self.sim
    }
}

/// Future returned by [`ProcessContext::hold`].
pub struct HoldFuture {
    sim: WeakScheduler,
    pid: ProcessId,
    dt: f64,
    parked: bool,
}

impl Future for HoldFuture {
    type Output = SimulationResult<()>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.parked {
            // Dispatched again: the hold has elapsed.
            return Poll::Ready(Ok(()));
        }
        let sim = match self.sim.upgrade() {
            Ok(sim) => sim,
            Err(e) => return Poll::Ready(Err(e)),
        };
        if !self.dt.is_finite() || self.dt < 0.0 {
            return Poll::Ready(Err(SimulationError::InvalidParameter(format!(
                "hold({}) requires a non-negative finite delay",
                self.dt
            ))));
        }
        if let Err(e) = sim.suspend_hold(self.pid, self.dt) {
            return Poll::Ready(Err(e));
        }
        self.parked = true;
        Poll::Pending
    }
}

/// Future returned by [`ProcessContext::passivate`].
pub struct PassivateFuture {
    sim: WeakScheduler,
    pid: ProcessId,
    parked: bool,
}

impl Future for PassivateFuture {
    type Output = SimulationResult<()>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.parked {
            return Poll::Ready(Ok(()));
        }
        let sim = match self.sim.upgrade() {
            Ok(sim) => sim,
            Err(e) => return Poll::Ready(Err(e)),
        };
        if let Err(e) = sim.suspend_passivate(self.pid) {
            return Poll::Ready(Err(e));
        }
        self.parked = true;
        Poll::Pending
    }
}

/// Future returned by [`ProcessContext::terminate`]; never resolves.
pub struct TerminateFuture {
    sim: WeakScheduler,
    pid: ProcessId,
}

impl Future for TerminateFuture {
    type Output = SimulationResult<()>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let sim = match self.sim.upgrade() {
            Ok(sim) => sim,
            Err(e) => return Poll::Ready(Err(e)),
        };
        if let Err(e) = sim.suspend_terminate(self.pid) {
            return Poll::Ready(Err(e));
        }
        // The scheduler drops the body after this poll; the process never
        // resumes.
        Poll::Pending
    }
}
