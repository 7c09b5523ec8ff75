use axum::{
    extract::{Query, State},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{error_body, ApiResult};
use crate::AppState;

/// Health check (GET /health)
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Recent audit entries (GET /audit?limit=)
pub async fn recent_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<impl IntoResponse> {
    let audit = state.audit.lock().await;
    let entries = audit.recent_entries(query.limit.min(500)).map_err(|e| {
        tracing::error!("Failed to read audit log: {}", e);
        error_body(
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "storage",
            e.to_string(),
        )
    })?;
    Ok(Json(json!({ "entries": entries })))
}
