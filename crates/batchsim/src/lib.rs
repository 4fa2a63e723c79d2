#![doc = include_str!("../readme.md")]

pub mod batch_simulation;
pub mod campaign;
pub mod compute_node;
pub mod config;
pub mod generator;
pub mod job;
pub mod master_node;
pub mod summary;
pub mod tracker;

#[cfg(test)]
mod tests;

pub use batch_simulation::{run_simulation, BatchSimulation};
pub use config::SimulationConfig;
pub use summary::RunSummary;
