//! Scheduler and process lifecycle tests: hold chains, activation
//! ordering, cancellation and fatal programmer errors.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use chronosim::{
    ErrorKind, Process, ProcessContext, ProcessHandle, ProcessState, Scheduler, SimulationError,
    SimulationResult,
};

type Log = Rc<RefCell<Vec<f64>>>;

struct HoldChain {
    log: Log,
}

#[async_trait(?Send)]
impl Process for HoldChain {
    async fn body(self: Box<Self>, ctx: ProcessContext) -> SimulationResult<()> {
        ctx.hold(1.0).await?;
        self.log.borrow_mut().push(ctx.now().as_f64());
        ctx.hold(2.0).await?;
        self.log.borrow_mut().push(ctx.now().as_f64());
        Ok(())
    }
}

#[test]
fn hold_chain_fires_at_expected_times() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Log = Rc::default();
    let proc = sim.register(HoldChain {
        log: Rc::clone(&log),
    });
    proc.activate().expect("activate");
    sim.run().expect("run");

    assert_eq!(*log.borrow(), vec![1.0, 3.0]);
    assert_eq!(sim.now().as_f64(), 3.0);
    assert_eq!(proc.state().expect("state"), ProcessState::Terminated);
    sim.terminate();
}

struct Stamp {
    tag: u64,
    log: Rc<RefCell<Vec<u64>>>,
}

#[async_trait(?Send)]
impl Process for Stamp {
    async fn body(self: Box<Self>, _ctx: ProcessContext) -> SimulationResult<()> {
        self.log.borrow_mut().push(self.tag);
        Ok(())
    }
}

#[test]
fn same_time_activations_run_in_activation_order() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Rc<RefCell<Vec<u64>>> = Rc::default();
    let handles: Vec<ProcessHandle> = (0..4)
        .map(|tag| {
            sim.register(Stamp {
                tag,
                log: Rc::clone(&log),
            })
        })
        .collect();
    // Activate in reverse registration order; dispatch must follow the
    // activation order, not the ids.
    for h in handles.iter().rev() {
        h.activate().expect("activate");
    }
    sim.run().expect("run");
    assert_eq!(*log.borrow(), vec![3, 2, 1, 0]);
    sim.terminate();
}

struct StampNow {
    log: Log,
}

#[async_trait(?Send)]
impl Process for StampNow {
    async fn body(self: Box<Self>, ctx: ProcessContext) -> SimulationResult<()> {
        self.log.borrow_mut().push(ctx.now().as_f64());
        Ok(())
    }
}

#[test]
fn reactivation_replaces_the_pending_record() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Log = Rc::default();
    let proc = sim.register(StampNow {
        log: Rc::clone(&log),
    });
    proc.activate_at(5.0).expect("activate_at");
    proc.activate_at(2.0).expect("reschedule");
    sim.run().expect("run");

    // One dispatch only, at the superseding time.
    assert_eq!(*log.borrow(), vec![2.0]);
    assert_eq!(sim.now().as_f64(), 2.0);
    sim.terminate();
}

#[test]
fn plain_activate_does_not_reschedule() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Log = Rc::default();
    let proc = sim.register(StampNow {
        log: Rc::clone(&log),
    });
    proc.activate_at(4.0).expect("activate_at");
    proc.activate().expect("no-effect activate");
    sim.run().expect("run");
    assert_eq!(*log.borrow(), vec![4.0]);
    sim.terminate();
}

struct Sleeper {
    log: Log,
}

#[async_trait(?Send)]
impl Process for Sleeper {
    async fn body(self: Box<Self>, ctx: ProcessContext) -> SimulationResult<()> {
        self.log.borrow_mut().push(ctx.now().as_f64());
        ctx.passivate().await?;
        self.log.borrow_mut().push(ctx.now().as_f64());
        Ok(())
    }
}

struct WakeLater {
    target: ProcessHandle,
}

#[async_trait(?Send)]
impl Process for WakeLater {
    async fn body(self: Box<Self>, ctx: ProcessContext) -> SimulationResult<()> {
        ctx.hold(4.0).await?;
        self.target.activate()?;
        Ok(())
    }
}

#[test]
fn passivated_process_resumes_only_on_external_activation() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Log = Rc::default();
    let sleeper = sim.register(Sleeper {
        log: Rc::clone(&log),
    });
    let waker = sim.register(WakeLater {
        target: sleeper.clone(),
    });
    sleeper.activate().expect("activate sleeper");
    waker.activate().expect("activate waker");
    sim.run().expect("run");

    assert_eq!(*log.borrow(), vec![0.0, 4.0]);
    sim.terminate();
}

#[test]
fn run_until_pushes_the_future_record_back() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Log = Rc::default();
    let proc = sim.register(HoldChain {
        log: Rc::clone(&log),
    });
    proc.activate().expect("activate");

    sim.run_until(2.0).expect("bounded run");
    assert_eq!(*log.borrow(), vec![1.0]);
    assert_eq!(sim.now().as_f64(), 1.0);
    assert_eq!(proc.state().expect("state"), ProcessState::Scheduled);

    // A later run picks the pushed-back record up intact.
    sim.run().expect("resume run");
    assert_eq!(*log.borrow(), vec![1.0, 3.0]);
    assert_eq!(sim.now().as_f64(), 3.0);
    sim.terminate();
}

struct NegativeHold;

#[async_trait(?Send)]
impl Process for NegativeHold {
    async fn body(self: Box<Self>, ctx: ProcessContext) -> SimulationResult<()> {
        ctx.hold(-1.0).await?;
        Ok(())
    }
}

#[test]
fn negative_hold_aborts_the_run_with_context() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let proc = sim.register(NegativeHold);
    proc.activate().expect("activate");
    let err = sim.run().expect_err("fatal");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    match err {
        SimulationError::ProcessAborted { pid, time, .. } => {
            assert_eq!(pid, proc.id());
            assert_eq!(time, 0.0);
        }
        other => panic!("expected ProcessAborted, got {other:?}"),
    }
    sim.terminate();
}

#[test]
fn scheduling_into_the_past_is_rejected() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Log = Rc::default();
    let early = sim.register(StampNow {
        log: Rc::clone(&log),
    });
    early.activate_at(3.0).expect("activate_at");
    sim.run().expect("run");
    assert_eq!(sim.now().as_f64(), 3.0);

    let late = sim.register(StampNow {
        log: Rc::clone(&log),
    });
    let err = late.activate_at(1.0).expect_err("backward");
    assert_eq!(err.kind(), ErrorKind::BackwardClock);
    let err = late.activate_delay(-0.5).expect_err("negative delay");
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    sim.terminate();
}

#[test]
fn terminate_cancels_the_pending_record() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Log = Rc::default();
    let proc = sim.register(StampNow {
        log: Rc::clone(&log),
    });
    proc.activate_at(2.0).expect("activate");
    proc.terminate_process().expect("terminate");
    sim.run().expect("run");

    assert!(log.borrow().is_empty());
    assert_eq!(proc.state().expect("state"), ProcessState::Terminated);

    let err = proc.terminate_process().expect_err("double terminate");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = proc.activate().expect_err("activate after terminate");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    sim.terminate();
}

#[test]
fn one_scheduler_per_thread() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let err = Scheduler::create().expect_err("nested create");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    sim.terminate();

    // Terminate frees the slot for a clean new run.
    let sim = Scheduler::create().expect("second run");
    assert_eq!(sim.now().as_f64(), 0.0);
    sim.terminate();
}

struct Stepper {
    holds: Vec<f64>,
    log: Log,
}

#[async_trait(?Send)]
impl Process for Stepper {
    async fn body(self: Box<Self>, ctx: ProcessContext) -> SimulationResult<()> {
        for dt in &self.holds {
            ctx.hold(*dt).await?;
            self.log.borrow_mut().push(ctx.now().as_f64());
        }
        Ok(())
    }
}

#[test]
fn dispatch_times_never_go_backwards() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Log = Rc::default();
    for holds in [vec![0.5, 0.5, 2.0], vec![0.25, 1.75], vec![3.0, 0.0]] {
        sim.register(Stepper {
            holds,
            log: Rc::clone(&log),
        })
        .activate()
        .expect("activate");
    }
    sim.run().expect("run");

    let times = log.borrow();
    assert!(!times.is_empty());
    assert!(times.windows(2).all(|w| w[0] <= w[1]), "times: {times:?}");
    sim.terminate();
}

struct Parent {
    log: Log,
}

#[async_trait(?Send)]
impl Process for Parent {
    async fn body(self: Box<Self>, ctx: ProcessContext) -> SimulationResult<()> {
        ctx.hold(1.0).await?;
        let child = ctx.scheduler()?.register(StampNow {
            log: Rc::clone(&self.log),
        });
        child.activate_delay(2.0)?;
        Ok(())
    }
}

#[test]
fn bodies_can_spawn_child_processes() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Log = Rc::default();
    sim.register(Parent {
        log: Rc::clone(&log),
    })
    .activate()
    .expect("activate");
    sim.run().expect("run");

    assert_eq!(*log.borrow(), vec![3.0]);
    sim.terminate();
}
