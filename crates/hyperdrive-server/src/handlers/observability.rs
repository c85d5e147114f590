//! Observability Surface Handlers
//!
//! Read-only views over the engines; all endpoints are safe to poll.

use crate::models::{
    BestProviderResponse, CircuitEntry, CircuitsResponse, ConnectionsResponse, ErrorBody,
    MetricsResponse, StatusResponse,
};
use crate::state::ApiState;
use chrono::Utc;
use hyperdrive_domain::value_objects::{
    AnalyticsReport, Capability, FailoverPrediction, OptimizationRecommendation,
    PerformanceMetrics, PredictiveAnalytics, ProviderType, SelectionMode, TimeRange,
};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, State};

const AUDIT_TAIL_LEN: usize = 32;

fn bad_request(message: impl ToString) -> (Status, Json<ErrorBody>) {
    (Status::BadRequest, Json(ErrorBody::new(message.to_string())))
}

/// Current orchestrator status
#[get("/status")]
pub fn get_status(state: &State<ApiState>) -> Json<StatusResponse> {
    let orchestrator = &state.orchestrator;
    Json(StatusResponse {
        selection_mode: orchestrator.selection_mode(),
        adaptive_enabled: orchestrator.adaptive_enabled(),
        total_providers: orchestrator.registry().len(),
        active_providers: orchestrator.active_providers().len(),
        generated_at: Utc::now(),
    })
}

/// Metrics snapshots for every provider with recorded state
#[get("/metrics")]
pub fn get_metrics(state: &State<ApiState>) -> Json<MetricsResponse> {
    let providers = state
        .orchestrator
        .metrics_store()
        .all_snapshots()
        .into_iter()
        .map(|(provider, snapshot)| (provider.to_string(), snapshot))
        .collect();
    Json(MetricsResponse { providers })
}

/// Metrics snapshot for one provider
#[get("/metrics/<provider>")]
pub fn get_provider_metrics(
    state: &State<ApiState>,
    provider: &str,
) -> Result<Json<PerformanceMetrics>, (Status, Json<ErrorBody>)> {
    let provider: ProviderType = provider.parse().map_err(bad_request)?;
    Ok(Json(state.orchestrator.metrics_store().snapshot(provider)))
}

/// Open connection counts
#[get("/connections")]
pub fn get_connections(state: &State<ApiState>) -> Json<ConnectionsResponse> {
    let connections = state
        .orchestrator
        .metrics_store()
        .connection_counts()
        .into_iter()
        .map(|(provider, count)| (provider.to_string(), count))
        .collect();
    Json(ConnectionsResponse { connections })
}

/// Circuit states plus the recent transition audit tail
#[get("/circuits")]
pub fn get_circuits(state: &State<ApiState>) -> Json<CircuitsResponse> {
    let states = state
        .orchestrator
        .circuit_states()
        .into_iter()
        .map(|(provider, circuit)| CircuitEntry {
            provider: provider.to_string(),
            state: circuit,
        })
        .collect();
    Json(CircuitsResponse {
        states,
        recent_transitions: state.orchestrator.circuits().audit_tail(AUDIT_TAIL_LEN),
    })
}

/// Aggregated analytics report
#[get("/analytics/report?<provider>&<time_range>")]
pub fn get_analytics_report(
    state: &State<ApiState>,
    provider: Option<&str>,
    time_range: Option<&str>,
) -> Result<Json<AnalyticsReport>, (Status, Json<ErrorBody>)> {
    let provider = provider
        .map(|p| p.parse::<ProviderType>())
        .transpose()
        .map_err(bad_request)?;
    let range = time_range
        .map(|r| r.parse::<TimeRange>())
        .transpose()
        .map_err(bad_request)?
        .unwrap_or_default();
    Ok(Json(state.orchestrator.analytics().report(provider, range)))
}

/// Trend forecast for one provider
#[get("/analytics/predictive/<provider>?<forecast_days>")]
pub fn get_predictive(
    state: &State<ApiState>,
    provider: &str,
    forecast_days: Option<u32>,
) -> Result<Json<PredictiveAnalytics>, (Status, Json<ErrorBody>)> {
    let provider: ProviderType = provider.parse().map_err(bad_request)?;
    Ok(Json(
        state
            .orchestrator
            .analytics()
            .predict(provider, forecast_days.unwrap_or(7)),
    ))
}

/// Fleet-wide failure risk ranking
#[get("/failover/predictions")]
pub fn get_failure_predictions(state: &State<ApiState>) -> Json<FailoverPrediction> {
    Json(state.orchestrator.analytics().failure_predictions())
}

/// Cost/performance optimization recommendations
#[get("/recommendations")]
pub fn get_recommendations(state: &State<ApiState>) -> Json<Vec<OptimizationRecommendation>> {
    Json(state.orchestrator.analytics().recommendations())
}

/// Preview the ranking the selector would produce right now
#[get("/best-provider?<capability>&<mode>")]
pub fn get_best_provider(
    state: &State<ApiState>,
    capability: Option<&str>,
    mode: Option<&str>,
) -> Result<Json<BestProviderResponse>, (Status, Json<ErrorBody>)> {
    let capability = capability
        .map(|c| c.parse::<Capability>())
        .transpose()
        .map_err(bad_request)?
        .unwrap_or(Capability::Read);
    let mode = mode
        .map(|m| m.parse::<SelectionMode>())
        .transpose()
        .map_err(bad_request)?;

    state
        .orchestrator
        .rank(capability, mode)
        .map(|ranked| Json(BestProviderResponse { ranked }))
        .map_err(|e| (Status::NotFound, Json(ErrorBody::new(e))))
}
