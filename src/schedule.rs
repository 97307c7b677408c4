//! Cooperative scheduler
//!
//! One logical thread of control. Callback bodies run as independently
//! suspendable tasks multiplexed onto the frame loop: each live task is
//! polled exactly once per tick, in the order it was spawned. A task
//! suspends only at the explicit wait points - [`Timer`] and [`NextTick`] -
//! never implicitly, so the tick-advance logic itself can never be
//! preempted mid-mutation.
//!
//! There is no cancellation and no timeout; a task ends only by returning.
//! A callback that blocks without suspending stalls everything, rendering
//! included. That hazard belongs to the caller and is not mitigated here.

use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// A spawned callback body.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()>>>;

struct Task {
    future: TaskFuture,
    /// The owning registration's re-entrancy flag; cleared on completion.
    running: Option<Rc<Cell<bool>>>,
}

/// Polls tasks once per tick and tracks the shared clock [`Timer`]s
/// compare against.
pub struct Scheduler {
    tasks: Vec<Task>,
    clock: Rc<Cell<f64>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_clock(Rc::new(Cell::new(0.0)))
    }

    /// A scheduler sharing an externally owned clock.
    pub fn with_clock(clock: Rc<Cell<f64>>) -> Self {
        Self {
            tasks: Vec::new(),
            clock,
        }
    }

    /// The clock handle timers are built from.
    pub fn clock(&self) -> Rc<Cell<f64>> {
        self.clock.clone()
    }

    /// Advance the clock to `now` (seconds). Called once per tick before
    /// any task is polled, so every task in a tick sees the same time.
    pub fn advance_clock(&self, now: f64) {
        self.clock.set(now);
    }

    /// Queue a task with no re-entrancy tracking.
    pub fn spawn(&mut self, future: TaskFuture) {
        self.tasks.push(Task {
            future,
            running: None,
        });
    }

    /// Queue a task that clears `running` when it completes.
    pub fn spawn_guarded(&mut self, future: TaskFuture, running: Rc<Cell<bool>>) {
        self.tasks.push(Task {
            future,
            running: Some(running),
        });
    }

    /// Poll every live task once, in spawn order. Completed tasks clear
    /// their registration flag and are dropped.
    pub fn run_once(&mut self) {
        let mut cx = Context::from_waker(Waker::noop());
        let mut i = 0;
        while i < self.tasks.len() {
            match self.tasks[i].future.as_mut().poll(&mut cx) {
                Poll::Ready(()) => {
                    if let Some(flag) = &self.tasks[i].running {
                        flag.set(false);
                    }
                    self.tasks.remove(i);
                }
                Poll::Pending => i += 1,
            }
        }
    }

    /// Number of tasks still alive (suspended mid-execution).
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// A timer that completes once the shared clock passes `seconds` from
    /// now.
    pub fn timer(&self, seconds: f64) -> Timer {
        Timer {
            clock: self.clock.clone(),
            deadline: self.clock.get() + seconds,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Suspends the awaiting task until the deadline passes.
///
/// The comparison runs against the scheduler clock, which only moves at
/// tick boundaries - so a timer never wakes a task mid-tick.
pub struct Timer {
    clock: Rc<Cell<f64>>,
    deadline: f64,
}

impl Timer {
    pub(crate) fn new(clock: Rc<Cell<f64>>, deadline: f64) -> Self {
        Self { clock, deadline }
    }
}

impl Future for Timer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.clock.get() >= self.deadline {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

/// Suspends the awaiting task until the next tick: pends exactly once.
pub struct NextTick {
    yielded: bool,
}

impl Future for NextTick {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.get_mut().yielded = true;
            Poll::Pending
        }
    }
}

/// Yield until the next tick, letting the frame render between steps of an
/// animation loop.
pub fn animate() -> NextTick {
    NextTick { yielded: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_complete_in_spawn_order() {
        let mut scheduler = Scheduler::new();
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order = order.clone();
            scheduler.spawn(Box::pin(async move {
                order.borrow_mut().push(label);
            }));
        }
        scheduler.run_once();
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_next_tick_suspends_for_one_tick() {
        let mut scheduler = Scheduler::new();
        let steps = Rc::new(Cell::new(0));
        let counter = steps.clone();
        scheduler.spawn(Box::pin(async move {
            counter.set(1);
            animate().await;
            counter.set(2);
        }));
        scheduler.run_once();
        assert_eq!(steps.get(), 1);
        assert_eq!(scheduler.pending(), 1);
        scheduler.run_once();
        assert_eq!(steps.get(), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_timer_waits_for_the_clock() {
        let mut scheduler = Scheduler::new();
        scheduler.advance_clock(10.0);
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        let timer = scheduler.timer(1.0);
        scheduler.spawn(Box::pin(async move {
            timer.await;
            flag.set(true);
        }));

        scheduler.run_once();
        assert!(!done.get());
        scheduler.advance_clock(10.5);
        scheduler.run_once();
        assert!(!done.get());
        scheduler.advance_clock(11.0);
        scheduler.run_once();
        assert!(done.get());
    }

    #[test]
    fn test_completion_clears_the_running_flag() {
        let mut scheduler = Scheduler::new();
        let running = Rc::new(Cell::new(true));
        scheduler.spawn_guarded(
            Box::pin(async {
                animate().await;
            }),
            running.clone(),
        );
        scheduler.run_once();
        assert!(running.get(), "flag must stay set while suspended");
        scheduler.run_once();
        assert!(!running.get(), "flag must clear on completion");
    }
}
