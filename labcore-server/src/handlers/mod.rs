pub mod exams;
pub mod fields;
pub mod health;
pub mod instances;

use axum::{http::StatusCode, response::Json};
use labcore_store::{Operation, StoreError};
use serde_json::{json, Value};

use crate::audit::{self, AuditContext};
use crate::AppState;

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<Value>);

pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP status for a domain error code
pub fn status_for(code: &str) -> StatusCode {
    match code {
        "not-found" => StatusCode::NOT_FOUND,
        "conflict"
        | "invalid-composition-link"
        | "invalid-kind-for-operation"
        | "field-retired"
        | "invalid-status-transition"
        | "instance-closed"
        | "incomplete" => StatusCode::CONFLICT,
        "unknown-field" | "invalid-value" | "invalid-definition" => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_body(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": code, "message": message.into() })))
}

/// Map a store error to a response, logging infrastructure failures
pub fn store_error(err: &StoreError) -> ApiError {
    let code = err.code();
    let status = status_for(code);
    if status.is_server_error() {
        tracing::error!("Store failure: {}", err);
    }
    error_body(status, code, err.to_string())
}

/// Audit the outcome of a mutating store call and convert its error.
///
/// `id_of` names the affected entity on success; `fallback_id` is used when
/// the call failed.
pub fn audited<T>(
    state: &AppState,
    context: &AuditContext,
    operation: Operation,
    entity_type: &str,
    fallback_id: Option<&str>,
    result: labcore_store::Result<T>,
    id_of: impl FnOnce(&T) -> String,
) -> ApiResult<T> {
    match result {
        Ok(value) => {
            let id = id_of(&value);
            audit::log_operation_success(context, operation, entity_type, &id, &state.audit);
            Ok(value)
        }
        Err(err) => {
            audit::log_operation_error(
                context,
                operation,
                entity_type,
                fallback_id,
                &err.to_string(),
                &state.audit,
            );
            Err(store_error(&err))
        }
    }
}
