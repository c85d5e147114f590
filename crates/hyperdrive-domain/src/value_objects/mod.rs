//! Value Objects
//!
//! Immutable domain values shared across the orchestration core.

pub mod analytics;
pub mod circuit;
pub mod metrics;
pub mod operation;
pub mod permissions;
pub mod provider;
pub mod quota;
pub mod rules;

pub use analytics::*;
pub use circuit::*;
pub use metrics::*;
pub use operation::*;
pub use permissions::*;
pub use provider::*;
pub use quota::*;
pub use rules::*;
