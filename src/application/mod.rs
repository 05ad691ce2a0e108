//! Application layer - Services built on the ports.

pub mod jobs;
pub mod orchestrator;
pub mod separator;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;
