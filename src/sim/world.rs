//! The scheduler: virtual clock, event dispatch, process registry.
//!
//! One scheduler exists per run and per thread. It owns the event queue,
//! the clock, and a registration record for every process; embedders hold
//! cheap [`ProcessHandle`]s and the scheduler upgrades its own state
//! through an `Rc<RefCell<_>>` split so process bodies can re-enter it
//! from inside a poll.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use tracing::{debug, instrument, trace};

use crate::error::{SimulationError, SimulationResult};
use crate::events::{EventQueue, EventRecord};
use crate::sim::entity::{Entity, EntityContext, EntityHandle, WaitOutcome};
use crate::sim::process::{Process, ProcessContext, ProcessHandle, ProcessId, ProcessState};
use crate::time::VirtualTime;

type BodyFuture = Pin<Box<dyn Future<Output = SimulationResult<()>>>>;

/// Where a process body currently lives.
enum BodySlot {
    /// Registered, not yet dispatched: the body future is created lazily.
    Process(Box<dyn Process>),
    /// Same, for an entity.
    Entity(Box<dyn Entity>),
    /// Started and suspended.
    Active(BodyFuture),
    /// Terminated, or taken out for the poll in progress.
    Empty,
}

struct ProcessRecord {
    state: ProcessState,
    body: BodySlot,
    /// Sequence number of the live event record, if any. A heap entry
    /// whose seq no longer matches is stale and skipped on pop.
    pending_seq: Option<u64>,
    /// Sequence number of an armed `wait_for` timeout.
    timeout_seq: Option<u64>,
    /// Whether the last dispatch was the timeout record firing.
    resumed_by_timeout: bool,
    /// One-shot signal flags, latched by other processes.
    interrupted: bool,
    triggered: bool,
    /// Waiting in a semaphore's FIFO; such a process may only be resumed
    /// by the semaphore's release.
    on_semaphore: bool,
}

impl ProcessRecord {
    fn new(body: BodySlot) -> Self {
        ProcessRecord {
            state: ProcessState::Idle,
            body,
            pending_seq: None,
            timeout_seq: None,
            resumed_by_timeout: false,
            interrupted: false,
            triggered: false,
            on_semaphore: false,
        }
    }
}

struct SchedInner {
    clock: VirtualTime,
    queue: EventQueue,
    next_seq: u64,
    next_pid: u64,
    running: Option<ProcessId>,
    in_run: bool,
    procs: HashMap<ProcessId, ProcessRecord>,
}

impl SchedInner {
    fn new() -> Self {
        SchedInner {
            clock: VirtualTime::ZERO,
            queue: EventQueue::new(),
            next_seq: 0,
            next_pid: 0,
            running: None,
            in_run: false,
            procs: HashMap::new(),
        }
    }
}

thread_local! {
    /// The scheduler currently registered on this thread. Set by
    /// [`Scheduler::create`], cleared by [`Scheduler::terminate`]; a dead
    /// weak reference counts as free, so a dropped scheduler cannot wedge
    /// the thread.
    static CURRENT: RefCell<Option<Weak<RefCell<SchedInner>>>> = const { RefCell::new(None) };
}

/// Outcome of a single dispatch attempt.
enum Dispatch {
    /// A process was resumed.
    Dispatched,
    /// The queue is empty; the run is over.
    Exhausted,
    /// The next record lies beyond the `until` horizon and was pushed back.
    Horizon,
}

/// The central simulation controller: virtual clock, event queue and
/// process dispatch.
///
/// Exactly one scheduler may be live per thread (nested runs are
/// forbidden); [`Scheduler::terminate`] tears it down so a fresh run can
/// start cleanly.
pub struct Scheduler {
    inner: Rc<RefCell<SchedInner>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates the scheduler for this run and registers it as the
    /// thread's current one. `InvalidState` if a live scheduler already
    /// exists on this thread.
    pub fn create() -> SimulationResult<Scheduler> {
        CURRENT.with(|slot| {
            let mut slot = slot.borrow_mut();
            if slot.as_ref().is_some_and(|w| w.strong_count() > 0) {
                return Err(SimulationError::InvalidState(
                    "a scheduler is already active on this thread".into(),
                ));
            }
            let sched = Scheduler {
                inner: Rc::new(RefCell::new(SchedInner::new())),
            };
            *slot = Some(Rc::downgrade(&sched.inner));
            debug!("scheduler created");
            Ok(sched)
        })
    }

    /// The scheduler registered on this thread, if one is live.
    pub fn current() -> Option<Scheduler> {
        CURRENT.with(|slot| {
            slot.borrow()
                .as_ref()
                .and_then(Weak::upgrade)
                .map(|inner| Scheduler { inner })
        })
    }

    /// Tears the run down: drops every process, empties the queue and
    /// frees the thread's scheduler slot.
    pub fn terminate(self) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.queue.clear();
            inner.procs.clear();
            inner.running = None;
            inner.in_run = false;
            inner.clock = VirtualTime::ZERO;
        }
        CURRENT.with(|slot| {
            *slot.borrow_mut() = None;
        });
        debug!("scheduler terminated");
    }

    /// A weak reference for handle types.
    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Current virtual time.
    pub fn now(&self) -> VirtualTime {
        self.inner.borrow().clock
    }

    /// Registers a process; it starts Idle and runs only once activated.
    pub fn register<P: Process>(&self, process: P) -> ProcessHandle {
        let pid = self.insert_record(BodySlot::Process(Box::new(process)));
        ProcessHandle::new(self.downgrade(), pid)
    }

    /// Registers an entity; it starts Idle and runs only once activated.
    pub fn register_entity<E: Entity>(&self, entity: E) -> EntityHandle {
        let pid = self.insert_record(BodySlot::Entity(Box::new(entity)));
        EntityHandle::new(ProcessHandle::new(self.downgrade(), pid))
    }

    fn insert_record(&self, body: BodySlot) -> ProcessId {
        let mut inner = self.inner.borrow_mut();
        let pid = ProcessId::from_raw(inner.next_pid);
        inner.next_pid += 1;
        inner.procs.insert(pid, ProcessRecord::new(body));
        trace!(%pid, "process registered");
        pid
    }

    /// Runs until the event queue is empty. Returns the first fatal error
    /// raised by a process body, wrapped with its process id and time.
    #[instrument(skip(self))]
    pub fn run(&self) -> SimulationResult<()> {
        self.run_inner(None)
    }

    /// Runs until the queue is empty or the next record lies beyond
    /// `until`; such a record is pushed back intact so a later `run`
    /// resumes exactly where this one stopped.
    #[instrument(skip(self))]
    pub fn run_until(&self, until: f64) -> SimulationResult<()> {
        let limit = VirtualTime::new(until)?;
        self.run_inner(Some(limit))
    }

    /// Dispatches a single record. `Ok(true)` when a process ran,
    /// `Ok(false)` when the queue was empty.
    pub fn step(&self) -> SimulationResult<bool> {
        match self.dispatch_next(None)? {
            Dispatch::Dispatched => Ok(true),
            Dispatch::Exhausted | Dispatch::Horizon => Ok(false),
        }
    }

    fn run_inner(&self, until: Option<VirtualTime>) -> SimulationResult<()> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.in_run {
                return Err(SimulationError::InvalidState(
                    "run is not reentrant".into(),
                ));
            }
            inner.in_run = true;
        }
        let result = loop {
            match self.dispatch_next(until) {
                Ok(Dispatch::Dispatched) => continue,
                Ok(Dispatch::Exhausted) | Ok(Dispatch::Horizon) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.inner.borrow_mut().in_run = false;
        result
    }

    fn dispatch_next(&self, until: Option<VirtualTime>) -> SimulationResult<Dispatch> {
        // Phase 1: pull the next live record and mark its process Running.
        let pid = {
            let mut inner = self.inner.borrow_mut();
            loop {
                let Some(rec) = inner.queue.pop() else {
                    return Ok(Dispatch::Exhausted);
                };
                let live = inner
                    .procs
                    .get(&rec.pid)
                    .is_some_and(|r| r.pending_seq == Some(rec.seq));
                if !live {
                    continue;
                }
                if let Some(limit) = until
                    && rec.time > limit
                {
                    inner.queue.insert(rec);
                    return Ok(Dispatch::Horizon);
                }
                inner.clock = rec.time;
                let Some(r) = inner.procs.get_mut(&rec.pid) else {
                    continue;
                };
                r.pending_seq = None;
                r.resumed_by_timeout = r.timeout_seq == Some(rec.seq);
                r.timeout_seq = None;
                r.state = ProcessState::Running;
                inner.running = Some(rec.pid);
                trace!(pid = %rec.pid, time = %rec.time, "dispatch");
                break rec.pid;
            }
        };

        // Phase 2: take the body out of the registry before polling; the
        // body's suspension primitives re-enter the scheduler.
        let mut fut = {
            let mut inner = self.inner.borrow_mut();
            let r = inner
                .procs
                .get_mut(&pid)
                .ok_or_else(|| unknown_process(pid))?;
            match std::mem::replace(&mut r.body, BodySlot::Empty) {
                BodySlot::Process(p) => p.body(ProcessContext::new(self.downgrade(), pid)),
                BodySlot::Entity(e) => e.body(EntityContext::new(self.downgrade(), pid)),
                BodySlot::Active(f) => f,
                BodySlot::Empty => {
                    return Err(SimulationError::InvalidState(format!(
                        "process {pid} has no runnable body"
                    )));
                }
            }
        };
        let poll = fut
            .as_mut()
            .poll(&mut Context::from_waker(Waker::noop()));

        // Phase 3: record the outcome.
        let mut inner = self.inner.borrow_mut();
        inner.running = None;
        let time = inner.clock;
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        match poll {
            Poll::Ready(Ok(())) => {
                r.state = ProcessState::Terminated;
                r.pending_seq = None;
                debug!(%pid, %time, "process finished");
            }
            Poll::Ready(Err(e)) => {
                r.state = ProcessState::Terminated;
                r.pending_seq = None;
                return Err(SimulationError::ProcessAborted {
                    pid,
                    time: time.as_f64(),
                    source: Box::new(e),
                });
            }
            Poll::Pending => match r.state {
                // ctx.terminate(): the body is dropped here and never
                // polled again.
                ProcessState::Terminated => {}
                ProcessState::Running => {
                    r.state = ProcessState::Terminated;
                    return Err(SimulationError::ProcessAborted {
                        pid,
                        time: time.as_f64(),
                        source: Box::new(SimulationError::InvalidState(
                            "process suspended outside a kernel primitive".into(),
                        )),
                    });
                }
                _ => r.body = BodySlot::Active(fut),
            },
        }
        Ok(Dispatch::Dispatched)
    }

    // ------------------------------------------------------------------
    // Scheduling operations (handles)
    // ------------------------------------------------------------------

    pub(crate) fn state_of(&self, pid: ProcessId) -> SimulationResult<ProcessState> {
        let inner = self.inner.borrow();
        inner
            .procs
            .get(&pid)
            .map(|r| r.state)
            .ok_or_else(|| unknown_process(pid))
    }

    pub(crate) fn activate_now(&self, pid: ProcessId) -> SimulationResult<()> {
        let mut inner = self.inner.borrow_mut();
        let now = inner.clock;
        match guard_activation(&inner, pid, Reschedule::No)? {
            Activation::NoEffect => Ok(()),
            Activation::Schedule => schedule_locked(&mut inner, pid, now),
        }
    }

    pub(crate) fn activate_at(&self, pid: ProcessId, t: f64) -> SimulationResult<()> {
        let time = VirtualTime::new(t)?;
        let mut inner = self.inner.borrow_mut();
        if time < inner.clock {
            return Err(SimulationError::BackwardClock {
                requested: t,
                now: inner.clock.as_f64(),
            });
        }
        match guard_activation(&inner, pid, Reschedule::Yes)? {
            Activation::NoEffect => Ok(()),
            Activation::Schedule => schedule_locked(&mut inner, pid, time),
        }
    }

    pub(crate) fn activate_delay(&self, pid: ProcessId, dt: f64) -> SimulationResult<()> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimulationError::InvalidParameter(format!(
                "activate_delay({dt}) requires a non-negative finite delay"
            )));
        }
        let now = self.inner.borrow().clock;
        self.activate_at(pid, now.as_f64() + dt)
    }

    pub(crate) fn terminate_external(&self, pid: ProcessId) -> SimulationResult<()> {
        let mut inner = self.inner.borrow_mut();
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        if r.state == ProcessState::Terminated {
            return Err(SimulationError::InvalidState(format!(
                "process {pid} is already terminated"
            )));
        }
        r.state = ProcessState::Terminated;
        r.pending_seq = None;
        r.timeout_seq = None;
        r.body = BodySlot::Empty;
        debug!(%pid, "process terminated externally");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Suspension operations (futures, from inside the running body)
    // ------------------------------------------------------------------

    pub(crate) fn suspend_hold(&self, pid: ProcessId, dt: f64) -> SimulationResult<()> {
        let mut inner = self.inner.borrow_mut();
        assert_running(&inner, pid, "hold")?;
        let at = inner.clock.offset(dt);
        schedule_locked(&mut inner, pid, at)
    }

    pub(crate) fn suspend_passivate(&self, pid: ProcessId) -> SimulationResult<()> {
        let mut inner = self.inner.borrow_mut();
        assert_running(&inner, pid, "passivate")?;
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        r.pending_seq = None;
        r.state = ProcessState::Waiting;
        Ok(())
    }

    pub(crate) fn suspend_terminate(&self, pid: ProcessId) -> SimulationResult<()> {
        let mut inner = self.inner.borrow_mut();
        assert_running(&inner, pid, "terminate")?;
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        r.state = ProcessState::Terminated;
        r.pending_seq = None;
        r.timeout_seq = None;
        Ok(())
    }

    pub(crate) fn suspend_wait(&self, pid: ProcessId) -> SimulationResult<()> {
        let mut inner = self.inner.borrow_mut();
        assert_running(&inner, pid, "wait")?;
        let now = inner.clock;
        let latched = inner
            .procs
            .get(&pid)
            .is_some_and(|r| r.interrupted || r.triggered);
        if latched {
            // A signal arrived before the wait; still yield, observe on
            // resumption.
            return schedule_locked(&mut inner, pid, now);
        }
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        r.pending_seq = None;
        r.state = ProcessState::Waiting;
        Ok(())
    }

    pub(crate) fn suspend_wait_for(&self, pid: ProcessId, dt: f64) -> SimulationResult<()> {
        let mut inner = self.inner.borrow_mut();
        assert_running(&inner, pid, "wait_for")?;
        let now = inner.clock;
        let latched = inner
            .procs
            .get(&pid)
            .is_some_and(|r| r.interrupted || r.triggered);
        if latched {
            return schedule_locked(&mut inner, pid, now);
        }
        // Bind the timeout record: the process stays Waiting, but the
        // timer occupies its single record slot. A signal re-schedules the
        // process and the timer entry goes stale.
        let at = now.offset(dt);
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.queue.insert(EventRecord { time: at, seq, pid });
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        r.pending_seq = Some(seq);
        r.timeout_seq = Some(seq);
        r.state = ProcessState::Waiting;
        trace!(%pid, time = %at, "wait_for timeout armed");
        Ok(())
    }

    pub(crate) fn complete_wait(&self, pid: ProcessId) -> SimulationResult<WaitOutcome> {
        let mut inner = self.inner.borrow_mut();
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        let outcome = if r.interrupted {
            r.interrupted = false;
            WaitOutcome::Interrupted
        } else if r.triggered {
            r.triggered = false;
            WaitOutcome::Triggered
        } else if r.resumed_by_timeout {
            WaitOutcome::Timeout
        } else {
            WaitOutcome::Activated
        };
        r.resumed_by_timeout = false;
        Ok(outcome)
    }

    pub(crate) fn observe_interrupted(&self, pid: ProcessId) -> SimulationResult<bool> {
        let mut inner = self.inner.borrow_mut();
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        let was = r.interrupted;
        r.interrupted = false;
        Ok(was)
    }

    pub(crate) fn observe_triggered(&self, pid: ProcessId) -> SimulationResult<bool> {
        let mut inner = self.inner.borrow_mut();
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        let was = r.triggered;
        r.triggered = false;
        Ok(was)
    }

    // ------------------------------------------------------------------
    // Signals (entity handles)
    // ------------------------------------------------------------------

    pub(crate) fn interrupt_process(&self, pid: ProcessId) -> SimulationResult<()> {
        let mut inner = self.inner.borrow_mut();
        let now = inner.clock;
        let state = guard_signal(&inner, pid, "interrupt")?;
        {
            let r = inner
                .procs
                .get_mut(&pid)
                .ok_or_else(|| unknown_process(pid))?;
            r.interrupted = true;
        }
        match state {
            // Cancels a pending hold: the fresh record supersedes it.
            ProcessState::Waiting | ProcessState::Scheduled => {
                schedule_locked(&mut inner, pid, now)
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn trigger_process(&self, pid: ProcessId) -> SimulationResult<()> {
        let mut inner = self.inner.borrow_mut();
        let now = inner.clock;
        let state = guard_signal(&inner, pid, "trigger")?;
        {
            let r = inner
                .procs
                .get_mut(&pid)
                .ok_or_else(|| unknown_process(pid))?;
            r.triggered = true;
        }
        match state {
            ProcessState::Waiting => schedule_locked(&mut inner, pid, now),
            // Not waiting: the flag stays latched for the next wait.
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Semaphore support
    // ------------------------------------------------------------------

    pub(crate) fn suspend_semaphore(&self, pid: ProcessId) -> SimulationResult<()> {
        let mut inner = self.inner.borrow_mut();
        assert_running(&inner, pid, "semaphore get")?;
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        r.pending_seq = None;
        r.state = ProcessState::Waiting;
        r.on_semaphore = true;
        Ok(())
    }

    /// Hands the released resource to `pid`. `Ok(false)` when the waiter
    /// terminated in the meantime and the resource should go to the next
    /// one.
    pub(crate) fn resume_semaphore_waiter(&self, pid: ProcessId) -> SimulationResult<bool> {
        let mut inner = self.inner.borrow_mut();
        let now = inner.clock;
        let r = inner
            .procs
            .get_mut(&pid)
            .ok_or_else(|| unknown_process(pid))?;
        if r.state == ProcessState::Terminated {
            return Ok(false);
        }
        if r.state != ProcessState::Waiting || !r.on_semaphore {
            return Err(SimulationError::InvalidState(format!(
                "process {pid} is not waiting on a semaphore"
            )));
        }
        r.on_semaphore = false;
        schedule_locked(&mut inner, pid, now)?;
        Ok(true)
    }
}

/// A non-owning reference to a [`Scheduler`], held by handles, contexts
/// and synchronization objects.
#[derive(Clone)]
pub struct WeakScheduler {
    inner: Weak<RefCell<SchedInner>>,
}

impl WeakScheduler {
    /// Upgrades to the live scheduler; `InvalidState` after teardown.
    pub fn upgrade(&self) -> SimulationResult<Scheduler> {
        self.inner
            .upgrade()
            .map(|inner| Scheduler { inner })
            .ok_or_else(|| {
                SimulationError::InvalidState("the scheduler has been terminated".into())
            })
    }
}

enum Activation {
    NoEffect,
    Schedule,
}

/// Whether an already-Scheduled process gets its record replaced
/// (`activate_at`/`activate_delay`) or is left alone (`activate`).
enum Reschedule {
    Yes,
    No,
}

fn guard_activation(
    inner: &SchedInner,
    pid: ProcessId,
    reschedule: Reschedule,
) -> SimulationResult<Activation> {
    let r = inner.procs.get(&pid).ok_or_else(|| unknown_process(pid))?;
    match r.state {
        ProcessState::Terminated => Err(SimulationError::InvalidState(format!(
            "cannot activate terminated process {pid}"
        ))),
        ProcessState::Waiting if r.on_semaphore => Err(SimulationError::InvalidState(format!(
            "process {pid} is waiting on a semaphore"
        ))),
        ProcessState::Running => Ok(Activation::NoEffect),
        ProcessState::Scheduled => match reschedule {
            Reschedule::Yes => Ok(Activation::Schedule),
            Reschedule::No => Ok(Activation::NoEffect),
        },
        ProcessState::Idle | ProcessState::Waiting => Ok(Activation::Schedule),
    }
}

fn guard_signal(
    inner: &SchedInner,
    pid: ProcessId,
    op: &str,
) -> SimulationResult<ProcessState> {
    let r = inner.procs.get(&pid).ok_or_else(|| unknown_process(pid))?;
    match r.state {
        ProcessState::Terminated => Err(SimulationError::InvalidState(format!(
            "cannot {op} terminated process {pid}"
        ))),
        ProcessState::Waiting if r.on_semaphore => Err(SimulationError::InvalidState(format!(
            "cannot {op} process {pid} while it waits on a semaphore"
        ))),
        state => Ok(state),
    }
}

/// Inserts a fresh record for `pid` at `time` and marks it Scheduled. A
/// previously pending record is superseded (its heap entry goes stale).
fn schedule_locked(
    inner: &mut SchedInner,
    pid: ProcessId,
    time: VirtualTime,
) -> SimulationResult<()> {
    if time < inner.clock {
        return Err(SimulationError::BackwardClock {
            requested: time.as_f64(),
            now: inner.clock.as_f64(),
        });
    }
    let seq = inner.next_seq;
    inner.next_seq += 1;
    let r = inner.procs.get_mut(&pid).ok_or_else(|| unknown_process(pid))?;
    if r.state == ProcessState::Terminated {
        return Err(SimulationError::InvalidState(format!(
            "cannot schedule terminated process {pid}"
        )));
    }
    r.pending_seq = Some(seq);
    r.timeout_seq = None;
    r.state = ProcessState::Scheduled;
    inner.queue.insert(EventRecord { time, seq, pid });
    trace!(%pid, %time, seq, "scheduled");
    Ok(())
}

fn assert_running(inner: &SchedInner, pid: ProcessId, op: &str) -> SimulationResult<()> {
    if inner.running == Some(pid) {
        Ok(())
    } else {
        Err(SimulationError::InvalidState(format!(
            "{op} called outside the running body of process {pid}"
        )))
    }
}

fn unknown_process(pid: ProcessId) -> SimulationError {
    SimulationError::InvalidState(format!("unknown process {pid}"))
}
