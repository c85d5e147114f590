//! Domain layer constants
//!
//! Contains constants that are part of the selection and scoring logic and
//! are used by the application layer. Tunable engine defaults live in the
//! infrastructure configuration types.

// ============================================================================
// SELECTION WEIGHT CONSTANTS
// ============================================================================

/// Cost weight under the cost-optimized selection mode
pub const COST_MODE_COST_WEIGHT: f64 = 0.6;

/// Reliability weight under the cost-optimized selection mode
pub const COST_MODE_RELIABILITY_WEIGHT: f64 = 0.2;

/// Latency weight under the cost-optimized selection mode
pub const COST_MODE_LATENCY_WEIGHT: f64 = 0.2;

/// Cost weight under the performance-optimized selection mode
pub const PERF_MODE_COST_WEIGHT: f64 = 0.1;

/// Latency weight under the performance-optimized selection mode
pub const PERF_MODE_LATENCY_WEIGHT: f64 = 0.5;

/// Reliability weight under the performance-optimized selection mode
pub const PERF_MODE_RELIABILITY_WEIGHT: f64 = 0.4;

/// Ceiling applied to any single adaptive weight
pub const ADAPTIVE_WEIGHT_CEILING: f64 = 0.8;

/// Floor applied to any single adaptive weight
pub const ADAPTIVE_WEIGHT_FLOOR: f64 = 0.05;

/// Bounded bonus added for geographic affinity with the request region
pub const GEO_AFFINITY_BONUS: f64 = 0.05;

// ============================================================================
// METRICS DOMAIN CONSTANTS
// ============================================================================

/// Number of slots in the per-provider decayed latency reservoir
pub const LATENCY_RESERVOIR_SIZE: usize = 64;
