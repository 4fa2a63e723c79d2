//! Simulation configuration and execution.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::Future;
use log::debug;
use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::prelude::Distribution;
use serde_json::json;

use crate::async_core::channel::channel;
use crate::async_core::executor::Executor;
use crate::component::Id;
use crate::context::SimulationContext;
use crate::state::SimulationState;
use crate::sync::signal::Signal;

/// Represents a simulation, provides methods for its configuration and execution.
pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    name_to_id: HashMap<String, Id>,
    names: Rc<RefCell<Vec<String>>>,
    executor: Executor,
}

impl Simulation {
    /// Creates a new simulation with specified random seed.
    pub fn new(seed: u64) -> Self {
        let (task_sender, ready_queue) = channel();
        Self {
            sim_state: Rc::new(RefCell::new(SimulationState::new(seed, task_sender))),
            name_to_id: HashMap::new(),
            names: Rc::new(RefCell::new(Vec::new())),
            executor: Executor::new(ready_queue),
        }
    }

    fn register(&mut self, name: &str) -> Id {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }
        let id = self.name_to_id.len() as Id;
        self.name_to_id.insert(name.to_owned(), id);
        self.names.borrow_mut().push(name.to_owned());
        id
    }

    /// Returns the identifier of component by its name.
    ///
    /// Panics if component with such name does not exist.
    pub fn lookup_id(&self, name: &str) -> Id {
        *self
            .name_to_id
            .get(name)
            .unwrap_or_else(|| panic!("Component {} does not exist", name))
    }

    /// Returns the name of component by its identifier.
    ///
    /// Panics if component with such Id does not exist.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names.borrow()[id as usize].clone()
    }

    /// Creates a new simulation context with specified name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use batchsim_core::Simulation;
    ///
    /// let mut sim = Simulation::new(123);
    /// let comp_ctx = sim.create_context("comp");
    /// assert_eq!(comp_ctx.id(), 0); // component ids are assigned sequentially starting from 0
    /// assert_eq!(comp_ctx.name(), "comp");
    /// ```
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let ctx = SimulationContext::new(
            self.register(name.as_ref()),
            name.as_ref(),
            self.sim_state.clone(),
            self.names.clone(),
        );
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Created context: {}",
            self.time(),
            crate::log::get_colored("DEBUG", colored::Color::Blue),
            json!({"name": ctx.name(), "id": ctx.id()})
        );
        ctx
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Spawns a new process which starts at the current simulation time.
    ///
    /// Processes spawned at the same time start in the order of spawning.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.sim_state.borrow_mut().spawn(future);
    }

    /// Creates a new one-shot signal bound to the simulation clock.
    pub fn create_signal(&self) -> Rc<Signal> {
        Rc::new(Signal::new(self.sim_state.clone()))
    }

    /// Performs a single step through the simulation.
    ///
    /// Either resumes the oldest ready process until it suspends again or finishes,
    /// or takes the earliest pending timer, advances the simulation time to the timer time
    /// and wakes up the process waiting for it.
    /// Wake-ups and timers due at the same time are processed in the order they were registered.
    ///
    /// Returns `true` if some progress was made and `false` if there are neither ready processes
    /// nor pending timers, i.e. the simulation is over.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use batchsim_core::Simulation;
    ///
    /// let mut sim = Simulation::new(123);
    /// let ctx = sim.create_context("comp");
    /// sim.spawn(async move {
    ///     ctx.sleep(1.2).await;
    /// });
    /// assert!(sim.step()); // process starts and suspends on timer
    /// assert!(sim.step()); // timer fires
    /// assert_eq!(sim.time(), 1.2);
    /// assert!(sim.step()); // process finishes
    /// assert!(!sim.step());
    /// ```
    pub fn step(&mut self) -> bool {
        let timer_first = {
            let mut state = self.sim_state.borrow_mut();
            let now = state.time();
            match (state.peek_timer(), self.executor.next_ready_id()) {
                (Some(timer), Some(ready_id)) => timer.time <= now && timer.id < ready_id,
                (Some(_), None) => true,
                (None, _) => false,
            }
        };
        if !timer_first {
            return self.executor.process_task();
        }
        let next_timer = self.sim_state.borrow_mut().next_timer();
        if let Some(timer) = next_timer {
            timer.complete();
        }
        true
    }

    /// Performs the specified number of steps through the simulation.
    ///
    /// Returns `true` if there could be more steps to make and `false` otherwise.
    pub fn steps(&mut self, step_count: u64) -> bool {
        for _ in 0..step_count {
            if !self.step() {
                return false;
            }
        }
        true
    }

    /// Steps through the simulation until there are no ready processes and no pending timers left.
    pub fn step_until_no_events(&mut self) {
        while self.step() {}
    }

    /// Steps through the simulation with duration limit.
    ///
    /// Processes everything scheduled up to `current_time + duration` inclusive.
    /// Returns `true` if there could be more pending timers and `false` otherwise.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use batchsim_core::Simulation;
    ///
    /// let mut sim = Simulation::new(123);
    /// let ctx = sim.create_context("comp");
    /// sim.spawn(async move {
    ///     ctx.sleep(1.).await;
    ///     ctx.sleep(1.).await;
    ///     ctx.sleep(1.5).await;
    /// });
    /// assert!(sim.step_for_duration(1.5));
    /// assert_eq!(sim.time(), 1.);
    /// assert!(!sim.step_for_duration(3.));
    /// assert_eq!(sim.time(), 3.5);
    /// ```
    pub fn step_for_duration(&mut self, duration: f64) -> bool {
        let end_time = self.time() + duration;
        loop {
            if !self.executor.has_ready_tasks() {
                match self.sim_state.borrow_mut().peek_timer() {
                    Some(timer) if timer.time > end_time => return true,
                    Some(_) => {}
                    None => return false,
                }
            }
            self.step();
        }
    }

    /// Returns a random float in the range _[0, 1)_
    /// using the simulation-wide random number generator.
    pub fn rand(&mut self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Returns a random number in the specified range
    /// using the simulation-wide random number generator.
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    /// Returns a random value from the specified distribution
    /// using the simulation-wide random number generator.
    pub fn sample_from_distribution<T, Dist: Distribution<T>>(&mut self, dist: &Dist) -> T {
        self.sim_state.borrow_mut().sample_from_distribution(dist)
    }

    /// Returns the total number of created timers, including the cancelled ones.
    pub fn timer_count(&self) -> u64 {
        self.sim_state.borrow().timer_count()
    }
}
