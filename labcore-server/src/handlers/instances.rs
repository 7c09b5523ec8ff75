//! Request exam instances, result entry and completion

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use labcore_core::{
    FieldId, InstanceId, InstanceStatus, LabError, NewInstance, ValueSubmission,
};
use labcore_store::{ExamEngine, Operation, StoreError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{audited, store_error, ApiResult};
use crate::audit::AuditContext;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ValueBody {
    pub value: String,
    #[serde(default)]
    pub observation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: InstanceStatus,
    #[serde(default)]
    pub recorded_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyResult {
    #[serde(default)]
    pub legacy_result: Option<String>,
}

/// Create instance (POST /instances)
pub async fn create_instance(
    State(state): State<Arc<AppState>>,
    audit_ctx: AuditContext,
    Json(body): Json<NewInstance>,
) -> ApiResult<impl IntoResponse> {
    let instance = audited(
        &state,
        &audit_ctx,
        Operation::Create,
        "Instance",
        None,
        state.store.create_instance(&body),
        |i| i.id.to_string(),
    )?;
    Ok((StatusCode::CREATED, Json(instance)))
}

/// Instance detail (GET /instances/{id})
pub async fn read_instance(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let instance = state
        .store
        .require_instance(InstanceId(id))
        .map_err(|e| store_error(&e))?;
    Ok(Json(instance))
}

/// Instances of one patient request (GET /requests/{ref}/instances)
pub async fn list_request(
    State(state): State<Arc<AppState>>,
    Path(request_ref): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let instances = state
        .store
        .list_request(&request_ref)
        .map_err(|e| store_error(&e))?;
    Ok(Json(json!({ "requestRef": request_ref, "instances": instances })))
}

/// Section-grouped values, including historical ones (GET /instances/{id}/values)
pub async fn instance_values(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let sections = ExamEngine::new(&state.store)
        .get_values_for_instance(InstanceId(id))
        .map_err(|e| store_error(&e))?;
    Ok(Json(json!({ "instanceId": id, "sections": sections })))
}

/// Submit one value (PUT /instances/{id}/values/{field})
pub async fn submit_value(
    State(state): State<Arc<AppState>>,
    Path((id, field)): Path<(i64, i64)>,
    audit_ctx: AuditContext,
    Json(body): Json<ValueBody>,
) -> ApiResult<impl IntoResponse> {
    let submission = ValueSubmission {
        field_id: FieldId(field),
        value: body.value,
        observation: body.observation,
    };
    let id_text = id.to_string();
    let outcome = audited(
        &state,
        &audit_ctx,
        Operation::Submit,
        "Instance",
        Some(&id_text),
        ExamEngine::new(&state.store).submit_value(InstanceId(id), &submission),
        |_| id_text.clone(),
    )?;
    Ok(Json(outcome))
}

/// Submit several values; each item is accepted or rejected on its own
/// (POST /instances/{id}/values)
pub async fn submit_batch(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    audit_ctx: AuditContext,
    Json(body): Json<Vec<ValueSubmission>>,
) -> ApiResult<impl IntoResponse> {
    let id_text = id.to_string();
    let outcomes = audited(
        &state,
        &audit_ctx,
        Operation::Submit,
        "Instance",
        Some(&id_text),
        ExamEngine::new(&state.store).submit_values_batch(InstanceId(id), &body),
        |_| id_text.clone(),
    )?;
    let accepted = outcomes.iter().filter(|o| o.accepted).count();
    Ok(Json(json!({
        "instanceId": id,
        "accepted": accepted,
        "rejected": outcomes.len() - accepted,
        "results": outcomes,
    })))
}

/// Completion predicate with missing fields (GET /instances/{id}/completion)
pub async fn completion(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let report = ExamEngine::new(&state.store)
        .completion_report(InstanceId(id))
        .map_err(|e| store_error(&e))?;
    Ok(Json(report))
}

/// Status transition (POST /instances/{id}/status).
///
/// Moving to `completed` requires the completion predicate to hold.
pub async fn change_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    audit_ctx: AuditContext,
    Json(body): Json<StatusChange>,
) -> ApiResult<impl IntoResponse> {
    let instance_id = InstanceId(id);
    let recorded_by = body.recorded_by.or_else(|| audit_ctx.actor.clone());

    let result = ensure_completable(&state, instance_id, body.status).and_then(|()| {
        state
            .store
            .transition_instance(instance_id, body.status, recorded_by.as_deref())
    });

    let id_text = id.to_string();
    let instance = audited(
        &state,
        &audit_ctx,
        Operation::Transition,
        "Instance",
        Some(&id_text),
        result,
        |i| i.id.to_string(),
    )?;
    Ok(Json(instance))
}

fn ensure_completable(
    state: &AppState,
    instance_id: InstanceId,
    status: InstanceStatus,
) -> labcore_store::Result<()> {
    if status != InstanceStatus::Completed {
        return Ok(());
    }
    let report = ExamEngine::new(&state.store).completion_report(instance_id)?;
    if report.complete {
        Ok(())
    } else {
        Err(StoreError::from(LabError::Incomplete { instance_id }))
    }
}

/// Set or clear the free-text result (PUT /instances/{id}/legacy-result)
pub async fn set_legacy_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    audit_ctx: AuditContext,
    Json(body): Json<LegacyResult>,
) -> ApiResult<impl IntoResponse> {
    let id_text = id.to_string();
    let instance = audited(
        &state,
        &audit_ctx,
        Operation::Submit,
        "Instance",
        Some(&id_text),
        state
            .store
            .set_legacy_result(InstanceId(id), body.legacy_result.as_deref()),
        |i| i.id.to_string(),
    )?;
    Ok(Json(instance))
}
