//! Route mounting

use crate::handlers::{config, observability, ops};
use crate::state::ApiState;
use rocket::{routes, Build, Rocket};

/// Build the Rocket instance with every surface mounted under
/// `/api/hyperdrive`
pub fn build_rocket(state: ApiState, figment: rocket::figment::Figment) -> Rocket<Build> {
    rocket::custom(figment).manage(state).mount(
        "/api/hyperdrive",
        routes![
            // Configuration surface
            config::get_replication_rules,
            config::put_replication_rules,
            config::get_failover_rules,
            config::put_failover_rules,
            config::get_mode,
            config::put_mode,
            config::get_subscription,
            config::put_subscription,
            config::get_permissions,
            config::put_permissions,
            // Observability surface
            observability::get_status,
            observability::get_metrics,
            observability::get_provider_metrics,
            observability::get_connections,
            observability::get_circuits,
            observability::get_analytics_report,
            observability::get_predictive,
            observability::get_failure_predictions,
            observability::get_recommendations,
            observability::get_best_provider,
            // Operational surface
            ops::reset_provider_metrics,
            ops::reset_all_metrics,
            ops::preventive_failover,
            ops::put_adaptive,
            ops::record_request,
            ops::get_usage,
        ],
    )
}
