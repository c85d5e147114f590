//! HTTP handlers
//!
//! Grouped by surface: configuration (full-document PUT), observability
//! (read-only), and operational actions.

pub mod config;
pub mod observability;
pub mod ops;
