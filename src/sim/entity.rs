//! Entities: processes with wait/interrupt/trigger affordances.
//!
//! An [`Entity`] extends the process model with one-shot causal signals.
//! Another process latches the `interrupted` or `triggered` flag through
//! the entity's handle; the entity observes exactly one of them when its
//! `wait` resumes, and the observed flag is cleared.

use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;

use crate::error::{SimulationError, SimulationResult};
use crate::sim::process::{ProcessContext, ProcessHandle, ProcessId};
use crate::sim::sync::TriggerQueue;
use crate::sim::world::WeakScheduler;

/// Why a `wait` resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Another process delivered an interrupt.
    Interrupted,
    /// Another process delivered a trigger.
    Triggered,
    /// A `wait_for` deadline elapsed; both flags are false.
    Timeout,
    /// A plain `activate*` resumed the entity; both flags are false.
    Activated,
}

/// A simulation entity: a process that can `wait` for signals.
#[async_trait(?Send)]
pub trait Entity: 'static {
    /// The entity behavior, suspended only through `ctx`.
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()>;
}

/// Capabilities available to an entity from inside its own body.
///
/// Dereferences to [`ProcessContext`], so `hold`, `passivate` and friends
/// are available as well.
#[derive(Clone)]
pub struct EntityContext {
    inner: ProcessContext,
}

impl EntityContext {
    pub(crate) fn new(sim: WeakScheduler, pid: ProcessId) -> Self {
        EntityContext {
            inner: ProcessContext::new(sim, pid),
        }
    }

    /// Suspends until another process interrupts or triggers this entity
    /// (or a plain activation resumes it). A signal latched before the
    /// call is observed after one yield at the current time, so `wait` is
    /// always a suspension point.
    pub fn wait(&self) -> WaitFuture {
        WaitFuture {
            sim: self.inner.sim().clone(),
            pid: self.inner.id(),
            parked: false,
        }
    }

    /// As [`EntityContext::wait`], with a deadline `dt` from now.
    /// Whichever of signal and timeout fires first cancels the other;
    /// a timeout reports [`WaitOutcome::Timeout`] with both flags false.
    pub fn wait_for(&self, dt: f64) -> WaitForFuture {
        WaitForFuture {
            sim: self.inner.sim().clone(),
            pid: self.inner.id(),
            dt,
            parked: false,
        }
    }

    /// Joins `queue` and waits for a trigger delivered through it.
    pub fn wait_on(&self, queue: &TriggerQueue) -> SimulationResult<WaitFuture> {
        queue.insert_pid(self.inner.id())?;
        Ok(self.wait())
    }

    /// Whether an interrupt was delivered and not yet observed. The flag
    /// is one-shot: observing it clears it. This is how a process resumed
    /// early from a `hold` learns why.
    pub fn interrupted(&self) -> SimulationResult<bool> {
        self.inner.sim().upgrade()?.observe_interrupted(self.inner.id())
    }

    /// Whether a trigger was delivered and not yet observed; one-shot,
    /// cleared by observation.
    pub fn triggered(&self) -> SimulationResult<bool> {
        self.inner.sim().upgrade()?.observe_triggered(self.inner.id())
    }
}

impl Deref for EntityContext {
    type Target = ProcessContext;

    fn deref(&self) -> &ProcessContext {
        &self.inner
    }
}

/// External handle to a registered entity.
///
/// Dereferences to [`ProcessHandle`] for the plain scheduling operations.
#[derive(Clone)]
pub struct EntityHandle {
    inner: ProcessHandle,
}

impl EntityHandle {
    pub(crate) fn new(inner: ProcessHandle) -> Self {
        EntityHandle { inner }
    }

    /// Latches this entity's `interrupted` flag. A Waiting entity is
    /// activated at the current time; an entity mid-`hold` has its pending
    /// record cancelled and is activated immediately; otherwise the flag
    /// stays latched for the next `wait`.
    pub fn interrupt(&self) -> SimulationResult<()> {
        self.inner.sim().upgrade()?.interrupt_process(self.inner.id())
    }

    /// Latches this entity's `triggered` flag. A Waiting entity is
    /// activated at the current time; otherwise the flag stays latched for
    /// the next `wait`.
    pub fn trigger(&self) -> SimulationResult<()> {
        self.inner.sim().upgrade()?.trigger_process(self.inner.id())
    }
}

impl Deref for EntityHandle {
    type Target = ProcessHandle;

    fn deref(&self) -> &ProcessHandle {
        &self.inner
    }
}

/// Future returned by [`EntityContext::wait`].
pub struct WaitFuture {
    sim: WeakScheduler,
    pid: ProcessId,
    parked: bool,
}

impl Future for WaitFuture {
    type Output = SimulationResult<WaitOutcome>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let sim = match self.sim.upgrade() {
            Ok(sim) => sim,
            Err(e) => return Poll::Ready(Err(e)),
        };
        if self.parked {
            return Poll::Ready(sim.complete_wait(self.pid));
        }
        if let Err(e) = sim.suspend_wait(self.pid) {
            return Poll::Ready(Err(e));
        }
        self.parked = true;
        Poll::Pending
    }
}

/// Future returned by [`EntityContext::wait_for`].
pub struct WaitForFuture {
    sim: WeakScheduler,
    pid: ProcessId,
    dt: f64,
    parked: bool,
}

impl Future for WaitForFuture {
    type Output = SimulationResult<WaitOutcome>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let sim = match self.sim.upgrade() {
            Ok(sim) => sim,
            Err(e) => return Poll::Ready(Err(e)),
        };
        if self.parked {
            return Poll::Ready(sim.complete_wait(self.pid));
        }
        if !self.dt.is_finite() || self.dt < 0.0 {
            return Poll::Ready(Err(SimulationError::InvalidParameter(format!(
                "wait_for({}) requires a non-negative finite timeout",
                self.dt
            ))));
        }
        if let Err(e) = sim.suspend_wait_for(self.pid, self.dt) {
            return Poll::Ready(Err(e));
        }
        self.parked = true;
        Poll::Pending
    }
}
