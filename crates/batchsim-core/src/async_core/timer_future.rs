//! Waiting for simulation time to pass.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use super::channel::EventId;
use crate::component::Id;
use crate::state::SimulationState;

pub(crate) type TimerId = EventId;

// Timer future --------------------------------------------------------------------------------------------------------

/// Future returned by [`SimulationContext::sleep`](crate::SimulationContext::sleep).
///
/// Completes when the simulation clock reaches the timer time.
/// Dropping an incomplete future cancels the timer.
pub struct TimerFuture {
    timer_id: TimerId,
    state: Rc<RefCell<TimerAwaitState>>,
    sim_state: Rc<RefCell<SimulationState>>,
}

impl Future for TimerFuture {
    type Output = ();

    fn poll(self: Pin<&mut Self>, async_ctx: &mut Context) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        if state.completed {
            Poll::Ready(())
        } else {
            state.waker = Some(async_ctx.waker().clone());
            Poll::Pending
        }
    }
}

impl Drop for TimerFuture {
    fn drop(&mut self) {
        if !self.state.borrow().completed {
            self.sim_state
                .borrow_mut()
                .on_incomplete_timer_future_drop(self.timer_id);
        }
    }
}

// Timer promise -------------------------------------------------------------------------------------------------------

/// Pending timer stored in the simulation state.
///
/// Promises are ordered by time and then by creation order,
/// the comparison is inverted to be used with `BinaryHeap`.
pub(crate) struct TimerPromise {
    pub id: TimerId,
    pub component_id: Id,
    pub time: f64,
    state: Rc<RefCell<TimerAwaitState>>,
}

impl TimerPromise {
    pub fn new(id: TimerId, component_id: Id, time: f64) -> Self {
        Self {
            id,
            component_id,
            time,
            state: Rc::new(RefCell::new(TimerAwaitState::default())),
        }
    }

    pub fn future(&self, sim_state: Rc<RefCell<SimulationState>>) -> TimerFuture {
        TimerFuture {
            timer_id: self.id,
            state: self.state.clone(),
            sim_state,
        }
    }

    pub fn complete(&self) {
        // the waker is taken out first so that the state is not borrowed while waking
        let waker = self.state.borrow_mut().complete();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Eq for TimerPromise {}

impl PartialEq for TimerPromise {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Ord for TimerPromise {
    fn cmp(&self, other: &Self) -> Ordering {
        other.time.total_cmp(&self.time).then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerPromise {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct TimerAwaitState {
    completed: bool,
    waker: Option<Waker>,
}

impl TimerAwaitState {
    fn complete(&mut self) -> Option<Waker> {
        self.completed = true;
        self.waker.take()
    }
}
