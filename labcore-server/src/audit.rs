use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use labcore_store::{AuditLog, AuditRecord, Operation};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Header naming the operator performing a request
pub const ACTOR_HEADER: &str = "x-actor";

/// Audit context extracted from HTTP request
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub actor: Option<String>,
    pub client_ip: String,
}

impl AuditContext {
    /// Create audit context without connection info (for testing)
    pub fn new(actor: Option<String>, client_ip: String) -> Self {
        Self { actor, client_ip }
    }

    fn from_parts(parts: &Parts) -> Self {
        let client_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Self { actor, client_ip }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuditContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

/// Log a successful operation
pub fn log_operation_success(
    context: &AuditContext,
    operation: Operation,
    entity_type: &str,
    entity_id: &str,
    audit_log: &Arc<Mutex<AuditLog>>,
) {
    tracing::info!(
        actor = context.actor.as_deref().unwrap_or("anonymous"),
        client_ip = %context.client_ip,
        operation = operation.as_str(),
        entity_type = entity_type,
        entity_id = entity_id,
        status = "success",
        "Audit: {} {}/{}",
        operation.as_str(),
        entity_type,
        entity_id
    );

    // Write to database asynchronously in a spawned task
    let context = context.clone();
    let entity_type = entity_type.to_string();
    let entity_id = entity_id.to_string();
    let audit_log = Arc::clone(audit_log);

    tokio::spawn(async move {
        let audit = audit_log.lock().await;
        let record = AuditRecord::new(operation, &entity_type)
            .entity(&entity_id)
            .actor(context.actor.as_deref())
            .client_ip(Some(&context.client_ip));
        if let Err(e) = audit.log_success(&record) {
            tracing::error!("Failed to write audit log to database: {}", e);
        }
    });
}

/// Log a failed operation
pub fn log_operation_error(
    context: &AuditContext,
    operation: Operation,
    entity_type: &str,
    entity_id: Option<&str>,
    error: &str,
    audit_log: &Arc<Mutex<AuditLog>>,
) {
    tracing::warn!(
        actor = context.actor.as_deref().unwrap_or("anonymous"),
        client_ip = %context.client_ip,
        operation = operation.as_str(),
        entity_type = entity_type,
        entity_id = entity_id.unwrap_or("N/A"),
        status = "error",
        error = error,
        "Audit: {} {} failed: {}",
        operation.as_str(),
        entity_type,
        error
    );

    let context = context.clone();
    let entity_type = entity_type.to_string();
    let entity_id = entity_id.map(|s| s.to_string());
    let error = error.to_string();
    let audit_log = Arc::clone(audit_log);

    tokio::spawn(async move {
        let audit = audit_log.lock().await;
        let mut record = AuditRecord::new(operation, &entity_type)
            .actor(context.actor.as_deref())
            .client_ip(Some(&context.client_ip));
        if let Some(id) = entity_id.as_deref() {
            record = record.entity(id);
        }
        if let Err(e) = audit.log_error(&record, &error) {
            tracing::error!("Failed to write audit log to database: {}", e);
        }
    });
}
