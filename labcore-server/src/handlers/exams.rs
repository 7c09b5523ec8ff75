//! Exam catalog, field definition and composition endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use labcore_core::{ExamFilter, ExamId, ExamKind, FieldAttributes, NewExam};
use labcore_store::{ExamEngine, Operation};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{audited, store_error, ApiResult};
use crate::audit::AuditContext;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct KindChange {
    pub kind: ExamKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComponent {
    pub child_id: ExamId,
    #[serde(default)]
    pub order: i32,
}

/// List categories (GET /categories)
pub async fn list_categories(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let categories = state.store.list_categories().map_err(|e| store_error(&e))?;
    Ok(Json(categories))
}

/// Create category (POST /categories)
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    audit_ctx: AuditContext,
    Json(body): Json<NewCategory>,
) -> ApiResult<impl IntoResponse> {
    let category = audited(
        &state,
        &audit_ctx,
        Operation::Create,
        "Category",
        None,
        state.store.create_category(&body.name),
        |c| c.id.to_string(),
    )?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Filtered catalog listing (GET /exams)
pub async fn list_exams(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ExamFilter>,
) -> ApiResult<impl IntoResponse> {
    let exams = state
        .store
        .list_exams(&filter)
        .map_err(|e| store_error(&e))?;
    Ok(Json(json!({ "total": exams.len(), "exams": exams })))
}

/// Create exam (POST /exams)
pub async fn create_exam(
    State(state): State<Arc<AppState>>,
    audit_ctx: AuditContext,
    Json(body): Json<NewExam>,
) -> ApiResult<impl IntoResponse> {
    let exam = audited(
        &state,
        &audit_ctx,
        Operation::Create,
        "Exam",
        None,
        state.store.create_exam(&body),
        |e| e.id.to_string(),
    )?;
    Ok((StatusCode::CREATED, Json(exam)))
}

/// Exam lookup with its components (GET /exams/{id})
pub async fn read_exam(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let id = ExamId(id);
    let exam = state.store.require_exam(id).map_err(|e| store_error(&e))?;
    let components = state.store.list_links(id).map_err(|e| store_error(&e))?;
    Ok(Json(json!({ "exam": exam, "components": components })))
}

/// Change exam kind (PUT /exams/{id}/kind)
pub async fn change_kind(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    audit_ctx: AuditContext,
    Json(body): Json<KindChange>,
) -> ApiResult<impl IntoResponse> {
    let id_text = id.to_string();
    let exam = audited(
        &state,
        &audit_ctx,
        Operation::Update,
        "Exam",
        Some(&id_text),
        state.store.change_exam_kind(ExamId(id), body.kind),
        |e| e.id.to_string(),
    )?;
    Ok(Json(exam))
}

/// Soft-deactivate exam (DELETE /exams/{id})
pub async fn deactivate_exam(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    audit_ctx: AuditContext,
) -> ApiResult<impl IntoResponse> {
    let id_text = id.to_string();
    let exam = audited(
        &state,
        &audit_ctx,
        Operation::Deactivate,
        "Exam",
        Some(&id_text),
        state.store.deactivate_exam(ExamId(id)),
        |e| e.id.to_string(),
    )?;
    Ok(Json(exam))
}

/// Aggregated, section-grouped fields (GET /exams/{id}/fields)
pub async fn exam_fields(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let sections = ExamEngine::new(&state.store)
        .get_fields_for_exam(ExamId(id))
        .map_err(|e| store_error(&e))?;
    Ok(Json(json!({ "examId": id, "sections": sections })))
}

/// Add an own field (POST /exams/{id}/fields)
pub async fn add_field(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    audit_ctx: AuditContext,
    Json(body): Json<FieldAttributes>,
) -> ApiResult<impl IntoResponse> {
    let field = audited(
        &state,
        &audit_ctx,
        Operation::Create,
        "Field",
        None,
        state.store.add_field(ExamId(id), &body),
        |f| f.id.to_string(),
    )?;
    Ok((StatusCode::CREATED, Json(field)))
}

/// Link a component exam (POST /exams/{id}/components)
pub async fn add_component(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    audit_ctx: AuditContext,
    Json(body): Json<NewComponent>,
) -> ApiResult<impl IntoResponse> {
    let id_text = id.to_string();
    let link = audited(
        &state,
        &audit_ctx,
        Operation::Link,
        "Exam",
        Some(&id_text),
        state.store.add_link(ExamId(id), body.child_id, body.order),
        |l| format!("{}->{}", l.parent_id, l.child_id),
    )?;
    Ok((StatusCode::CREATED, Json(link)))
}

/// Deactivate a component link (DELETE /exams/{id}/components/{child})
pub async fn remove_component(
    State(state): State<Arc<AppState>>,
    Path((id, child)): Path<(i64, i64)>,
    audit_ctx: AuditContext,
) -> ApiResult<impl IntoResponse> {
    let link_text = format!("{}->{}", id, child);
    let removed = audited(
        &state,
        &audit_ctx,
        Operation::Unlink,
        "Exam",
        Some(&link_text),
        state.store.deactivate_link(ExamId(id), ExamId(child)),
        |_| link_text.clone(),
    )?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(super::error_body(
            StatusCode::NOT_FOUND,
            "not-found",
            format!("No active component {} on exam {}", child, id),
        ))
    }
}
