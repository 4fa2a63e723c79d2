//! Accessing simulation from components.

use std::cell::RefCell;
use std::rc::Rc;

use futures::Future;
use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::prelude::Distribution;

use crate::async_core::timer_future::TimerFuture;
use crate::component::Id;
use crate::state::SimulationState;
use crate::sync::signal::Signal;

/// A facade for accessing the simulation clock, random number generator and process spawning
/// from simulation components.
pub struct SimulationContext {
    id: Id,
    name: String,
    sim_state: Rc<RefCell<SimulationState>>,
    names: Rc<RefCell<Vec<String>>>,
}

impl SimulationContext {
    pub(crate) fn new(
        id: Id,
        name: &str,
        sim_state: Rc<RefCell<SimulationState>>,
        names: Rc<RefCell<Vec<String>>>,
    ) -> Self {
        Self {
            id,
            name: name.to_owned(),
            sim_state,
            names,
        }
    }

    /// Returns the identifier of component associated with this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Returns a random float in the range _[0, 1)_
    /// using the simulation-wide random number generator.
    pub fn rand(&self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Returns a random number in the specified range
    /// using the simulation-wide random number generator.
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    /// Returns a random value from the specified distribution
    /// using the simulation-wide random number generator.
    pub fn sample_from_distribution<T, Dist: Distribution<T>>(&self, dist: &Dist) -> T {
        self.sim_state.borrow_mut().sample_from_distribution(dist)
    }

    /// Suspends the calling process for `delay` time units.
    ///
    /// Timers expiring at the same time complete in the order of their creation.
    /// Panics if `delay` is negative.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use batchsim_core::Simulation;
    ///
    /// let mut sim = Simulation::new(123);
    /// let ctx = sim.create_context("comp");
    ///
    /// sim.spawn(async move {
    ///     ctx.sleep(1.5).await;
    ///     assert_eq!(ctx.time(), 1.5);
    /// });
    ///
    /// sim.step_until_no_events();
    /// assert_eq!(sim.time(), 1.5);
    /// ```
    pub fn sleep(&self, delay: f64) -> TimerFuture {
        self.sim_state
            .borrow_mut()
            .create_timer(self.id, delay, self.sim_state.clone())
    }

    /// Spawns a new process which starts at the current simulation time,
    /// after the processes which are already ready to run.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.sim_state.borrow_mut().spawn(future);
    }

    /// Creates a new one-shot signal which remembers the simulation time it was fired at.
    pub fn create_signal(&self) -> Rc<Signal> {
        Rc::new(Signal::new(self.sim_state.clone()))
    }

    /// Lookup component name by its identifier.
    pub fn lookup_name(&self, id: Id) -> String {
        self.names.borrow()[id as usize].clone()
    }
}
