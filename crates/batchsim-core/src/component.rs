//! Simulation component identifiers.

/// Identifier of a simulation component, assigned sequentially by [`Simulation::create_context`](crate::Simulation::create_context).
pub type Id = u32;
