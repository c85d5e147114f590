//! Server Layer - HyperDrive Orchestration Core
//!
//! Rocket-based JSON control plane over the orchestrator:
//!
//! - Configuration surface: rule documents, selection mode, quota and
//!   permission policies (idempotent full-document PUT)
//! - Observability surface: metrics, circuit states, analytics reports,
//!   predictive risk, recommendations (read-only, safe to poll)
//! - Operational surface: metrics reset, manual preventive failover,
//!   adaptive mode toggle, external outcome ingestion

pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;

pub use routes::build_rocket;
pub use state::ApiState;
