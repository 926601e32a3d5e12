//! Entity signal tests: interrupts, triggers, wait timeouts and trigger
//! queue fanout.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use chronosim::{
    Entity, EntityContext, EntityHandle, ErrorKind, Scheduler, SimulationResult, TriggerQueue,
    WaitOutcome,
};

type OutcomeLog = Rc<RefCell<Vec<(f64, WaitOutcome)>>>;

struct LongHolder {
    log: Rc<RefCell<Vec<(f64, bool)>>>,
}

#[async_trait(?Send)]
impl Entity for LongHolder {
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()> {
        ctx.hold(10.0).await?;
        let interrupted = ctx.interrupted()?;
        self.log.borrow_mut().push((ctx.now().as_f64(), interrupted));
        Ok(())
    }
}

struct DelayedInterrupt {
    target: EntityHandle,
}

#[async_trait(?Send)]
impl Entity for DelayedInterrupt {
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()> {
        ctx.hold(3.0).await?;
        self.target.interrupt()?;
        Ok(())
    }
}

#[test]
fn interrupt_cancels_a_pending_hold() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Rc<RefCell<Vec<(f64, bool)>>> = Rc::default();
    let holder = sim.register_entity(LongHolder {
        log: Rc::clone(&log),
    });
    let interrupter = sim.register_entity(DelayedInterrupt {
        target: holder.clone(),
    });
    holder.activate().expect("activate holder");
    interrupter.activate().expect("activate interrupter");
    sim.run().expect("run");

    // The holder resumed at the interrupt, not at 10.0, and saw the flag.
    assert_eq!(*log.borrow(), vec![(3.0, true)]);
    assert_eq!(sim.now().as_f64(), 3.0);
    sim.terminate();
}

struct Waiter {
    log: OutcomeLog,
}

#[async_trait(?Send)]
impl Entity for Waiter {
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()> {
        let outcome = ctx.wait().await?;
        self.log.borrow_mut().push((ctx.now().as_f64(), outcome));
        // Exclusivity: the other flag must not be latched too.
        assert!(!ctx.interrupted()?);
        assert!(!ctx.triggered()?);
        Ok(())
    }
}

struct DelayedTrigger {
    target: EntityHandle,
}

#[async_trait(?Send)]
impl Entity for DelayedTrigger {
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()> {
        ctx.hold(1.0).await?;
        self.target.trigger()?;
        Ok(())
    }
}

#[test]
fn trigger_wakes_a_waiting_entity() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: OutcomeLog = Rc::default();
    let waiter = sim.register_entity(Waiter {
        log: Rc::clone(&log),
    });
    let trigger = sim.register_entity(DelayedTrigger {
        target: waiter.clone(),
    });
    waiter.activate().expect("activate waiter");
    trigger.activate().expect("activate trigger");
    sim.run().expect("run");

    assert_eq!(*log.borrow(), vec![(1.0, WaitOutcome::Triggered)]);
    sim.terminate();
}

struct TimedWaiter {
    timeout: f64,
    log: OutcomeLog,
}

#[async_trait(?Send)]
impl Entity for TimedWaiter {
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()> {
        let outcome = ctx.wait_for(self.timeout).await?;
        self.log.borrow_mut().push((ctx.now().as_f64(), outcome));
        Ok(())
    }
}

#[test]
fn wait_for_times_out_with_no_flags() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: OutcomeLog = Rc::default();
    sim.register_entity(TimedWaiter {
        timeout: 2.0,
        log: Rc::clone(&log),
    })
    .activate()
    .expect("activate");
    sim.run().expect("run");

    assert_eq!(*log.borrow(), vec![(2.0, WaitOutcome::Timeout)]);
    assert_eq!(sim.now().as_f64(), 2.0);
    sim.terminate();
}

#[test]
fn signal_before_the_deadline_cancels_the_timer() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: OutcomeLog = Rc::default();
    let waiter = sim.register_entity(TimedWaiter {
        timeout: 5.0,
        log: Rc::clone(&log),
    });
    let trigger = sim.register_entity(DelayedTrigger {
        target: waiter.clone(),
    });
    waiter.activate().expect("activate waiter");
    trigger.activate().expect("activate trigger");
    sim.run().expect("run");

    assert_eq!(*log.borrow(), vec![(1.0, WaitOutcome::Triggered)]);
    // The cancelled timeout record never advanced the clock to 5.0.
    assert_eq!(sim.now().as_f64(), 1.0);
    sim.terminate();
}

#[test]
fn trigger_latches_until_the_next_wait() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: OutcomeLog = Rc::default();
    let waiter = sim.register_entity(Waiter {
        log: Rc::clone(&log),
    });
    // The entity is Idle: the trigger latches instead of activating it.
    waiter.trigger().expect("latch trigger");
    waiter.activate().expect("activate");
    sim.run().expect("run");

    assert_eq!(*log.borrow(), vec![(0.0, WaitOutcome::Triggered)]);
    sim.terminate();
}

struct DoubleWaiter {
    log: Rc<RefCell<Vec<WaitOutcome>>>,
}

#[async_trait(?Send)]
impl Entity for DoubleWaiter {
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()> {
        let first = ctx.wait().await?;
        self.log.borrow_mut().push(first);
        let second = ctx.wait().await?;
        self.log.borrow_mut().push(second);
        Ok(())
    }
}

struct RacingSignals {
    target: EntityHandle,
}

#[async_trait(?Send)]
impl Entity for RacingSignals {
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()> {
        // The interrupt wakes the waiter; the trigger arrives before it
        // resumes and must stay latched for its second wait.
        self.target.interrupt()?;
        self.target.trigger()?;
        ctx.hold(0.0).await?;
        Ok(())
    }
}

#[test]
fn racing_signals_are_observed_one_per_resumption() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: Rc<RefCell<Vec<WaitOutcome>>> = Rc::default();
    let waiter = sim.register_entity(DoubleWaiter {
        log: Rc::clone(&log),
    });
    let signals = sim.register_entity(RacingSignals {
        target: waiter.clone(),
    });
    waiter.activate().expect("activate waiter");
    signals.activate().expect("activate signals");
    sim.run().expect("run");

    assert_eq!(
        *log.borrow(),
        vec![WaitOutcome::Interrupted, WaitOutcome::Triggered]
    );
    sim.terminate();
}

struct QueueMember {
    tag: u64,
    queue: TriggerQueue,
    log: Rc<RefCell<Vec<(u64, f64)>>>,
}

#[async_trait(?Send)]
impl Entity for QueueMember {
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()> {
        let outcome = ctx.wait_on(&self.queue)?.await?;
        assert_eq!(outcome, WaitOutcome::Triggered);
        self.log.borrow_mut().push((self.tag, ctx.now().as_f64()));
        Ok(())
    }
}

struct FanoutCaller {
    queue: TriggerQueue,
}

#[async_trait(?Send)]
impl Entity for FanoutCaller {
    async fn body(self: Box<Self>, ctx: EntityContext) -> SimulationResult<()> {
        ctx.hold(1.5).await?;
        let woken = self.queue.trigger_all()?;
        assert_eq!(woken, 3);
        Ok(())
    }
}

#[test]
fn trigger_all_wakes_members_in_insertion_order() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let queue = TriggerQueue::new(&sim);
    let log: Rc<RefCell<Vec<(u64, f64)>>> = Rc::default();
    for tag in 0..3 {
        sim.register_entity(QueueMember {
            tag,
            queue: queue.clone(),
            log: Rc::clone(&log),
        })
        .activate()
        .expect("activate member");
    }
    sim.register_entity(FanoutCaller {
        queue: queue.clone(),
    })
    .activate()
    .expect("activate caller");
    sim.run().expect("run");

    // All three resume within the same virtual instant, FIFO.
    assert_eq!(*log.borrow(), vec![(0, 1.5), (1, 1.5), (2, 1.5)]);
    assert!(queue.is_empty());
    sim.terminate();
}

#[test]
fn trigger_first_on_an_empty_queue_is_a_typed_domain_error() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let queue = TriggerQueue::new(&sim);
    let err = queue.trigger_first().expect_err("empty queue");
    assert_eq!(err.kind(), ErrorKind::QueueEmpty);
    sim.terminate();
}

#[test]
fn signals_to_terminated_entities_are_rejected() {
    let sim = Scheduler::create().expect("fresh scheduler");
    let log: OutcomeLog = Rc::default();
    let waiter = sim.register_entity(Waiter {
        log: Rc::clone(&log),
    });
    waiter.terminate_process().expect("terminate");
    assert_eq!(
        waiter.interrupt().expect_err("interrupt").kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        waiter.trigger().expect_err("trigger").kind(),
        ErrorKind::InvalidState
    );
    sim.terminate();
}
