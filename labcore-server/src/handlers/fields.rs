//! Field definition lifecycle endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use labcore_core::{FieldAttributes, FieldId, LabError};
use labcore_store::{Operation, StoreError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{audited, store_error, ApiResult};
use crate::audit::AuditContext;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct Retirement {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct Revision {
    pub attributes: FieldAttributes,
    pub reason: String,
}

/// Single field definition (GET /fields/{id})
pub async fn read_field(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let field = state
        .store
        .get_field(FieldId(id))
        .and_then(|f| f.ok_or_else(|| StoreError::from(LabError::field_not_found(FieldId(id)))))
        .map_err(|e| store_error(&e))?;
    Ok(Json(field))
}

/// Retire a field (POST /fields/{id}/retire)
pub async fn retire_field(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    audit_ctx: AuditContext,
    Json(body): Json<Retirement>,
) -> ApiResult<impl IntoResponse> {
    let id_text = id.to_string();
    let field = audited(
        &state,
        &audit_ctx,
        Operation::Retire,
        "Field",
        Some(&id_text),
        state.store.retire_field(FieldId(id), &body.reason),
        |f| f.id.to_string(),
    )?;
    Ok(Json(field))
}

/// Retire a field and append its next version (POST /fields/{id}/revise)
pub async fn revise_field(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    audit_ctx: AuditContext,
    Json(body): Json<Revision>,
) -> ApiResult<impl IntoResponse> {
    let id_text = id.to_string();
    let field = audited(
        &state,
        &audit_ctx,
        Operation::Revise,
        "Field",
        Some(&id_text),
        state
            .store
            .revise_field(FieldId(id), &body.attributes, &body.reason),
        |f| f.id.to_string(),
    )?;
    Ok((StatusCode::CREATED, Json(field)))
}

/// Every version of the field's slot (GET /fields/{id}/history)
pub async fn field_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let field = state
        .store
        .get_field(FieldId(id))
        .map_err(|e| store_error(&e))?
        .ok_or_else(|| store_error(&LabError::field_not_found(FieldId(id)).into()))?;
    let versions = state
        .store
        .slot_history(field.slot_id)
        .map_err(|e| store_error(&e))?;
    Ok(Json(json!({ "slotId": field.slot_id, "versions": versions })))
}
