//! Configuration Surface Handlers
//!
//! Rule documents, selection mode, quota and permission policies. PUT is
//! idempotent and takes the full document; partial updates are not
//! supported. Invalid documents are rejected with 422 before anything is
//! applied.

use crate::models::{Ack, ErrorBody, ModeDoc};
use crate::state::ApiState;
use hyperdrive_domain::value_objects::{
    DataPermissions, FailoverRules, QuotaPolicy, ReplicationRules,
};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, put, State};

/// Get the current replication rule document
#[get("/replication/rules")]
pub fn get_replication_rules(state: &State<ApiState>) -> Json<ReplicationRules> {
    Json(state.orchestrator.rule_engine().replication_rules())
}

/// Replace the replication rule document
#[put("/replication/rules", format = "json", data = "<rules>")]
pub fn put_replication_rules(
    state: &State<ApiState>,
    rules: Json<ReplicationRules>,
) -> Result<Json<Ack>, (Status, Json<ErrorBody>)> {
    state
        .orchestrator
        .rule_engine()
        .set_replication_rules(rules.into_inner())
        .map(|()| Json(Ack::applied()))
        .map_err(|e| (Status::UnprocessableEntity, Json(ErrorBody::new(e))))
}

/// Get the current failover rule document
#[get("/failover/rules")]
pub fn get_failover_rules(state: &State<ApiState>) -> Json<FailoverRules> {
    Json(state.orchestrator.rule_engine().failover_rules())
}

/// Replace the failover rule document
#[put("/failover/rules", format = "json", data = "<rules>")]
pub fn put_failover_rules(
    state: &State<ApiState>,
    rules: Json<FailoverRules>,
) -> Result<Json<Ack>, (Status, Json<ErrorBody>)> {
    state
        .orchestrator
        .rule_engine()
        .set_failover_rules(rules.into_inner())
        .map(|()| Json(Ack::applied()))
        .map_err(|e| (Status::UnprocessableEntity, Json(ErrorBody::new(e))))
}

/// Get the selection mode
#[get("/mode")]
pub fn get_mode(state: &State<ApiState>) -> Json<ModeDoc> {
    Json(ModeDoc {
        mode: state.orchestrator.selection_mode(),
    })
}

/// Set the selection mode
#[put("/mode", format = "json", data = "<doc>")]
pub fn put_mode(state: &State<ApiState>, doc: Json<ModeDoc>) -> Json<Ack> {
    state.orchestrator.set_selection_mode(doc.mode);
    Json(Ack::applied())
}

/// Get the quota policy
#[get("/subscription")]
pub fn get_subscription(state: &State<ApiState>) -> Json<QuotaPolicy> {
    Json(state.orchestrator.quota().policy())
}

/// Replace the quota policy
#[put("/subscription", format = "json", data = "<policy>")]
pub fn put_subscription(
    state: &State<ApiState>,
    policy: Json<QuotaPolicy>,
) -> Result<Json<Ack>, (Status, Json<ErrorBody>)> {
    state
        .orchestrator
        .quota()
        .set_policy(policy.into_inner())
        .map(|()| Json(Ack::applied()))
        .map_err(|e| (Status::UnprocessableEntity, Json(ErrorBody::new(e))))
}

/// Get the permission document
#[get("/permissions")]
pub fn get_permissions(state: &State<ApiState>) -> Json<DataPermissions> {
    Json(state.orchestrator.permissions().policy())
}

/// Replace the permission document
#[put("/permissions", format = "json", data = "<policy>")]
pub fn put_permissions(state: &State<ApiState>, policy: Json<DataPermissions>) -> Json<Ack> {
    state.orchestrator.permissions().set_policy(policy.into_inner());
    Json(Ack::applied())
}
