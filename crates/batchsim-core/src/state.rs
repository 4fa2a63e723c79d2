use std::cell::RefCell;
use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;

use futures::Future;
use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::async_core::channel::Sender;
use crate::async_core::task::Task;
use crate::async_core::timer_future::{TimerFuture, TimerId, TimerPromise};
use crate::component::Id;
use crate::log::log_incorrect_timer;

/// Epsilon to compare floating point values for equality.
pub const EPSILON: f64 = 1e-12;

pub(crate) struct SimulationState {
    clock: f64,
    rand: Pcg64,
    timers: BinaryHeap<TimerPromise>,
    canceled_timers: HashSet<TimerId>,
    timer_count: u64,
    executor: Sender<Rc<Task>>,
}

impl SimulationState {
    pub fn new(seed: u64, executor: Sender<Rc<Task>>) -> Self {
        Self {
            clock: 0.0,
            rand: Pcg64::seed_from_u64(seed),
            timers: BinaryHeap::new(),
            canceled_timers: HashSet::new(),
            timer_count: 0,
            executor,
        }
    }

    pub fn time(&self) -> f64 {
        self.clock
    }

    pub fn rand(&mut self) -> f64 {
        self.rand.gen_range(0.0..1.0)
    }

    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.rand.gen_range(range)
    }

    pub fn sample_from_distribution<T, Dist: Distribution<T>>(&mut self, dist: &Dist) -> T {
        dist.sample(&mut self.rand)
    }

    // Processes -------------------------------------------------------------------------------------------------------

    pub fn spawn(&mut self, future: impl Future<Output = ()> + 'static) {
        Task::spawn(future, self.executor.clone());
    }

    // Timers ----------------------------------------------------------------------------------------------------------

    pub fn create_timer(
        &mut self,
        component_id: Id,
        delay: f64,
        sim_state: Rc<RefCell<SimulationState>>,
    ) -> TimerFuture {
        let time = self.clock + delay.max(0.);
        if delay < -EPSILON {
            log_incorrect_timer(time, component_id, &format!("negative delay {}", delay));
            panic!("Timer delay is negative! It is not allowed to wait until a moment in the past.");
        }
        let promise = TimerPromise::new(self.executor.next_event_id(), component_id, time);
        let future = promise.future(sim_state);
        self.timers.push(promise);
        self.timer_count += 1;
        future
    }

    pub fn peek_timer(&mut self) -> Option<&TimerPromise> {
        loop {
            let timer_id = self.timers.peek()?.id;
            if self.canceled_timers.remove(&timer_id) {
                self.timers.pop();
            } else {
                return self.timers.peek();
            }
        }
    }

    pub fn next_timer(&mut self) -> Option<TimerPromise> {
        loop {
            let timer = self.timers.pop()?;
            if !self.canceled_timers.remove(&timer.id) {
                self.clock = timer.time;
                return Some(timer);
            }
        }
    }

    // Called by dropped TimerFuture that was not completed.
    pub fn on_incomplete_timer_future_drop(&mut self, timer_id: TimerId) {
        self.canceled_timers.insert(timer_id);
    }

    pub fn timer_count(&self) -> u64 {
        self.timer_count
    }
}
