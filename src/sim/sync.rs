//! Synchronization objects: counting semaphore and trigger queue.
//!
//! Both coordinate multi-process wake-ups through the scheduler; their
//! waiter queues are SIMSET lists, so membership checks and unlinks are
//! cheap and strictly FIFO.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tracing::trace;

use crate::error::{SimulationError, SimulationResult};
use crate::sim::entity::EntityHandle;
use crate::sim::process::{ProcessContext, ProcessId};
use crate::sim::world::{Scheduler, WeakScheduler};
use crate::simset::{Head, Link};

/// Result of a non-blocking acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryAcquire {
    /// A resource was taken.
    Acquired,
    /// No resource is available; a blocking `get` would suspend.
    WouldBlock,
}

struct SemInner {
    available: u32,
    /// Upper bound on `available` for bounded semaphores; releasing a
    /// full bounded semaphore means a release without a matching get.
    ceiling: Option<u32>,
    waiters: Head<ProcessId>,
}

/// A counting semaphore with strict FIFO waiters and no spurious wakeups.
///
/// `release` with a waiter present hands the resource over directly: the
/// capacity is unchanged and the head waiter is activated at the current
/// time. An unbounded semaphore (the default) accepts free releases, so a
/// zero-resource semaphore doubles as a condition variable; a bounded one
/// treats a release beyond its ceiling as a fatal programmer error.
#[derive(Clone)]
pub struct Semaphore {
    sim: WeakScheduler,
    inner: Rc<RefCell<SemInner>>,
}

impl Semaphore {
    /// Creates an unbounded semaphore holding `resources` units.
    pub fn new(sim: &Scheduler, resources: u32) -> Semaphore {
        Semaphore {
            sim: sim.downgrade(),
            inner: Rc::new(RefCell::new(SemInner {
                available: resources,
                ceiling: None,
                waiters: Head::new(),
            })),
        }
    }

    /// Creates a bounded semaphore: `available` can never exceed the
    /// initial `resources`, and a release beyond it is `InvalidState`.
    pub fn with_ceiling(sim: &Scheduler, resources: u32) -> Semaphore {
        Semaphore {
            sim: sim.downgrade(),
            inner: Rc::new(RefCell::new(SemInner {
                available: resources,
                ceiling: Some(resources),
                waiters: Head::new(),
            })),
        }
    }

    /// Acquires one resource, suspending the calling process in FIFO
    /// order when none is available. Must be awaited from inside the
    /// owner's body.
    pub fn get(&self, ctx: &ProcessContext) -> AcquireFuture {
        AcquireFuture {
            sim: self.sim.clone(),
            sem: Rc::clone(&self.inner),
            pid: ctx.id(),
            parked: false,
        }
    }

    /// Non-blocking acquisition attempt.
    pub fn try_get(&self) -> TryAcquire {
        let mut st = self.inner.borrow_mut();
        if st.available > 0 {
            st.available -= 1;
            TryAcquire::Acquired
        } else {
            TryAcquire::WouldBlock
        }
    }

    /// Releases one resource. With waiters queued, the head waiter is
    /// activated now and the capacity is unchanged; otherwise the
    /// capacity grows by one. On a bounded semaphore a release beyond the
    /// ceiling is `InvalidState` (release without a matching get).
    pub fn release(&self) -> SimulationResult<()> {
        let sim = self.sim.upgrade()?;
        loop {
            let link = {
                let st = self.inner.borrow();
                st.waiters.first()
            };
            match link {
                Some(link) => {
                    link.out();
                    let pid = link.value();
                    // A waiter that terminated while queued forfeits its
                    // turn; the resource goes to the next one.
                    if sim.resume_semaphore_waiter(pid)? {
                        trace!(%pid, "semaphore handed to waiter");
                        return Ok(());
                    }
                }
                None => {
                    let mut st = self.inner.borrow_mut();
                    if let Some(cap) = st.ceiling
                        && st.available == cap
                    {
                        return Err(SimulationError::InvalidState(
                            "semaphore release without a matching get".into(),
                        ));
                    }
                    st.available += 1;
                    return Ok(());
                }
            }
        }
    }

    /// Resources currently available without blocking.
    pub fn available(&self) -> u32 {
        self.inner.borrow().available
    }

    /// Number of processes queued on this semaphore.
    pub fn waiting(&self) -> usize {
        self.inner.borrow().waiters.cardinal()
    }
}

/// Future returned by [`Semaphore::get`].
pub struct AcquireFuture {
    sim: WeakScheduler,
    sem: Rc<RefCell<SemInner>>,
    pid: ProcessId,
    parked: bool,
}

impl Future for AcquireFuture {
    type Output = SimulationResult<()>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.parked {
            // Resumed by release: the resource was handed over.
            return Poll::Ready(Ok(()));
        }
        let sim = match self.sim.upgrade() {
            Ok(sim) => sim,
            Err(e) => return Poll::Ready(Err(e)),
        };
        {
            let mut st = self.sem.borrow_mut();
            if st.available > 0 {
                st.available -= 1;
                // Uncontended: no suspension.
                return Poll::Ready(Ok(()));
            }
        }
        if let Err(e) = sim.suspend_semaphore(self.pid) {
            return Poll::Ready(Err(e));
        }
        let waiters = self.sem.borrow().waiters.clone();
        Link::new(self.pid).link_into(&waiters);
        trace!(pid = %self.pid, "semaphore wait");
        self.parked = true;
        Poll::Pending
    }
}

/// A FIFO queue of entities awaiting a trigger.
#[derive(Clone)]
pub struct TriggerQueue {
    sim: WeakScheduler,
    list: Head<ProcessId>,
}

impl TriggerQueue {
    /// Creates an empty queue bound to `sim`.
    pub fn new(sim: &Scheduler) -> TriggerQueue {
        TriggerQueue {
            sim: sim.downgrade(),
            list: Head::new(),
        }
    }

    /// Appends `entity`; an entity appears at most once, so re-inserting
    /// is a no-op.
    pub fn insert(&self, entity: &EntityHandle) -> SimulationResult<()> {
        self.insert_pid(entity.id())
    }

    pub(crate) fn insert_pid(&self, pid: ProcessId) -> SimulationResult<()> {
        if self.list.values().contains(&pid) {
            return Ok(());
        }
        Link::new(pid).link_into(&self.list);
        Ok(())
    }

    /// Removes the head entity and triggers it. `QueueEmpty` (non-fatal)
    /// when nobody is waiting.
    pub fn trigger_first(&self) -> SimulationResult<ProcessId> {
        let sim = self.sim.upgrade()?;
        let link = self.list.pop_front().ok_or(SimulationError::QueueEmpty)?;
        let pid = link.value();
        sim.trigger_process(pid)?;
        Ok(pid)
    }

    /// Triggers every queued entity in insertion order, emptying the
    /// queue. All of them wake within the current virtual instant, in the
    /// order they were inserted. Returns how many were triggered.
    pub fn trigger_all(&self) -> SimulationResult<usize> {
        let sim = self.sim.upgrade()?;
        let snapshot = self.list.values();
        self.list.clear();
        for pid in &snapshot {
            sim.trigger_process(*pid)?;
        }
        Ok(snapshot.len())
    }

    /// Number of queued entities.
    pub fn len(&self) -> usize {
        self.list.cardinal()
    }

    /// True when nobody is queued.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}
