#![warn(missing_docs)]
#![doc = include_str!("../readme.md")]

pub mod component;
pub mod context;
pub mod log;
pub mod simulation;
pub mod sync;

mod async_core;
mod state;

pub use async_core::timer_future::TimerFuture;
pub use colored;
pub use component::Id;
pub use context::SimulationContext;
pub use simulation::Simulation;
pub use state::EPSILON;
pub use sync::resource::{Acquire, Resource, ResourceGuard};
pub use sync::signal::{Signal, SignalWait};
pub use sync::store::{Store, StoreGet};
