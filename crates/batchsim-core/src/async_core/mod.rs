//! Cooperative execution of simulation processes.

pub(crate) mod channel;
pub(crate) mod executor;
pub(crate) mod task;
pub mod timer_future;
