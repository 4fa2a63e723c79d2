//! One-shot signal.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::state::SimulationState;

/// One-shot signal which any number of processes can wait for.
///
/// The signal is either pending or fired, and goes from pending to fired exactly once.
/// Waiting on a fired signal completes immediately. Signals are created via
/// [`SimulationContext::create_signal`](crate::SimulationContext::create_signal)
/// and shared by cloning the returned `Rc`.
pub struct Signal {
    fired_at: RefCell<Option<f64>>,
    waiters: RefCell<Vec<Rc<RefCell<Option<Waker>>>>>,
    sim_state: Rc<RefCell<SimulationState>>,
}

impl Signal {
    pub(crate) fn new(sim_state: Rc<RefCell<SimulationState>>) -> Self {
        Self {
            fired_at: RefCell::new(None),
            waiters: RefCell::new(Vec::new()),
            sim_state,
        }
    }

    /// Fires the signal and wakes up all waiting processes.
    ///
    /// Returns `false` and does nothing if the signal was already fired.
    pub fn fire(&self) -> bool {
        if self.is_fired() {
            return false;
        }
        let now = self.sim_state.borrow().time();
        *self.fired_at.borrow_mut() = Some(now);
        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for waiter in waiters {
            let waker = waiter.borrow_mut().take();
            if let Some(waker) = waker {
                waker.wake();
            }
        }
        true
    }

    /// Returns `true` if the signal was fired.
    pub fn is_fired(&self) -> bool {
        self.fired_at.borrow().is_some()
    }

    /// Returns the simulation time the signal was fired at.
    pub fn fired_at(&self) -> Option<f64> {
        *self.fired_at.borrow()
    }

    /// Returns the number of processes waiting for the signal.
    pub fn waiting_count(&self) -> usize {
        self.waiters.borrow().len()
    }

    /// Returns a future which completes once the signal is fired.
    pub fn wait(&self) -> SignalWait<'_> {
        SignalWait {
            signal: self,
            waiter: None,
        }
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("fired_at", &self.fired_at())
            .field("waiting", &self.waiting_count())
            .finish()
    }
}

/// Future returned by [`Signal::wait`].
pub struct SignalWait<'a> {
    signal: &'a Signal,
    waiter: Option<Rc<RefCell<Option<Waker>>>>,
}

impl<'a> Future for SignalWait<'a> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, async_ctx: &mut Context) -> Poll<()> {
        if self.signal.is_fired() {
            self.waiter = None;
            return Poll::Ready(());
        }
        match self.waiter.as_ref() {
            Some(waiter) => {
                *waiter.borrow_mut() = Some(async_ctx.waker().clone());
            }
            None => {
                let waiter = Rc::new(RefCell::new(Some(async_ctx.waker().clone())));
                self.signal.waiters.borrow_mut().push(waiter.clone());
                self.waiter = Some(waiter);
            }
        }
        Poll::Pending
    }
}

impl<'a> Drop for SignalWait<'a> {
    fn drop(&mut self) {
        if let Some(waiter) = self.waiter.take() {
            self.signal.waiters.borrow_mut().retain(|w| !Rc::ptr_eq(w, &waiter));
        }
    }
}
