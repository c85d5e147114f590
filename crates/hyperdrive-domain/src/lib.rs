//! Domain Layer - HyperDrive Orchestration Core
//!
//! This crate contains the domain layer of the HyperDrive orchestration
//! core: the value objects, rule documents, and port contracts shared by
//! every other layer.
//!
//! ## Architecture
//!
//! The domain layer:
//! - Defines provider identity, capabilities, and performance state
//! - Defines the replication/failover rule documents as tagged variants
//!   validated at construction
//! - Defines the `ProviderExecutor` port every backend adapter implements
//! - Has no dependency on the async runtime, HTTP, or configuration
//!   machinery
//!
//! ## Dependencies
//!
//! Pure libraries only: serde for the wire representation, thiserror for
//! the error type, async-trait for port definitions.

pub mod constants;
pub mod error;
pub mod ports;
pub mod value_objects;

pub use error::{Error, Result};
