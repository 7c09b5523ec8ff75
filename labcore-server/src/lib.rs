//! labcore-server - JSON/HTTP boundary of the exam engine
//!
//! Exposes the catalog, field definitions, composition, result entry and
//! completion over axum.

pub mod audit;
pub mod config;
pub mod handlers;

use axum::{
    body::Body,
    http::Method,
    routing::{delete, get, post, put},
    Router,
};
use labcore_store::{AuditLog, LabStore};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    map_response_body::MapResponseBodyLayer,
    trace::TraceLayer,
};

use handlers::{exams, fields, health, instances};

/// Application state
pub struct AppState {
    pub store: LabStore,
    pub audit: Arc<Mutex<AuditLog>>,
    pub config: config::ServerConfig,
}

/// Build the application router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(MapResponseBodyLayer::new(Body::new))
        .layer(RequestBodyLimitLayer::new(state.config.server.body_limit));

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/audit", get(health::recent_audit))
        // Catalog
        .route(
            "/categories",
            get(exams::list_categories).post(exams::create_category),
        )
        .route("/exams", get(exams::list_exams).post(exams::create_exam))
        .route(
            "/exams/{id}",
            get(exams::read_exam).delete(exams::deactivate_exam),
        )
        .route("/exams/{id}/kind", put(exams::change_kind))
        .route(
            "/exams/{id}/fields",
            get(exams::exam_fields).post(exams::add_field),
        )
        .route("/exams/{id}/components", post(exams::add_component))
        .route(
            "/exams/{id}/components/{child}",
            delete(exams::remove_component),
        )
        // Field lifecycle
        .route("/fields/{id}", get(fields::read_field))
        .route("/fields/{id}/retire", post(fields::retire_field))
        .route("/fields/{id}/revise", post(fields::revise_field))
        .route("/fields/{id}/history", get(fields::field_history))
        // Instances and results
        .route("/requests/{request_ref}/instances", get(instances::list_request))
        .route("/instances", post(instances::create_instance))
        .route("/instances/{id}", get(instances::read_instance))
        .route(
            "/instances/{id}/values",
            get(instances::instance_values).post(instances::submit_batch),
        )
        .route("/instances/{id}/values/{field}", put(instances::submit_value))
        .route("/instances/{id}/completion", get(instances::completion))
        .route("/instances/{id}/status", post(instances::change_status))
        .route("/instances/{id}/legacy-result", put(instances::set_legacy_result))
        .layer(middleware)
        .with_state(state)
}
