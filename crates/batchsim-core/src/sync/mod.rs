//! Synchronization primitives for simulation processes.
//!
//! None of the non-suspending operations (`put`, `release`, `fire`) yields control:
//! they update the primitive state and wake up the affected processes, which are resumed
//! at the same simulation time after the calling process suspends.

pub mod resource;
pub mod signal;
pub mod store;
