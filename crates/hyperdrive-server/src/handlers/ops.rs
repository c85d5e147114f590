//! Operational Surface Handlers
//!
//! Manual interventions: metrics reset, preventive failover, adaptive mode
//! toggle, and ingestion of externally observed outcomes.

use crate::models::{
    Ack, AdaptiveDoc, ErrorBody, PreventiveRequest, PreventiveResponse, RecordRequestBody,
    UsageEntry, UsageResponse,
};
use crate::state::ApiState;
use chrono::Utc;
use hyperdrive_domain::value_objects::{AnalyticsDataPoint, ProviderType};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, put, State};
use std::time::Duration;

fn bad_request(message: impl ToString) -> (Status, Json<ErrorBody>) {
    (Status::BadRequest, Json(ErrorBody::new(message.to_string())))
}

/// Reset one provider's metrics
#[post("/metrics/<provider>/reset")]
pub fn reset_provider_metrics(
    state: &State<ApiState>,
    provider: &str,
) -> Result<Json<Ack>, (Status, Json<ErrorBody>)> {
    let provider: ProviderType = provider.parse().map_err(bad_request)?;
    state.orchestrator.metrics_store().reset_provider(provider);
    Ok(Json(Ack::applied()))
}

/// Reset every provider's metrics
#[post("/metrics/reset-all")]
pub fn reset_all_metrics(state: &State<ApiState>) -> Json<Ack> {
    state.orchestrator.metrics_store().reset_all();
    Json(Ack::applied())
}

/// Preventively isolate the supplied high-risk providers
#[post("/failover/preventive", format = "json", data = "<request>")]
pub fn preventive_failover(
    state: &State<ApiState>,
    request: Json<PreventiveRequest>,
) -> Result<Json<PreventiveResponse>, (Status, Json<ErrorBody>)> {
    let providers: Vec<ProviderType> = request
        .providers
        .iter()
        .map(|p| p.parse::<ProviderType>())
        .collect::<Result<_, _>>()
        .map_err(bad_request)?;

    let isolated = state.orchestrator.preventive_failover(&providers);
    Ok(Json(PreventiveResponse { isolated }))
}

/// Enable or disable the adaptive feedback loop
#[put("/adaptive", format = "json", data = "<doc>")]
pub fn put_adaptive(state: &State<ApiState>, doc: Json<AdaptiveDoc>) -> Json<Ack> {
    state.orchestrator.set_adaptive_enabled(doc.enabled);
    Json(Ack::applied())
}

/// Ingest an externally observed request outcome
///
/// Lets callers that dispatch to providers outside the orchestrator feed
/// the same metrics and analytics state.
#[post("/record-request", format = "json", data = "<body>")]
pub fn record_request(
    state: &State<ApiState>,
    body: Json<RecordRequestBody>,
) -> Result<Json<Ack>, (Status, Json<ErrorBody>)> {
    let provider: ProviderType = body.provider.parse().map_err(bad_request)?;
    if body.latency_ms < 0.0 {
        return Err(bad_request("latency_ms must be non-negative"));
    }

    state.orchestrator.metrics_store().record_outcome(
        provider,
        body.success,
        Duration::from_secs_f64(body.latency_ms / 1_000.0),
        body.cost,
    );
    state.orchestrator.analytics().record(AnalyticsDataPoint {
        timestamp: Utc::now(),
        provider,
        success: body.success,
        latency_ms: body.latency_ms,
        cost: body.cost,
        region: String::new(),
        operation: "external".to_string(),
    });
    Ok(Json(Ack::applied()))
}

/// Current usage against the quota policy
#[get("/subscription/usage")]
pub fn get_usage(state: &State<ApiState>) -> Json<UsageResponse> {
    let usage = state
        .orchestrator
        .quota()
        .all_usage()
        .into_iter()
        .map(|(resource, snapshot)| UsageEntry {
            resource,
            used: snapshot.used,
            limit: snapshot.limit,
        })
        .collect();
    Json(UsageResponse { usage })
}
