//! Ports
//!
//! Contracts the orchestration core consumes from the outside world.

pub mod executor;

pub use executor::*;
