//! labcore-server entry point

use labcore_core::CatalogSeedLoader;
use labcore_store::{AuditLog, LabStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use labcore_server::{
    build_router,
    config::{LogFormat, ServerConfig},
    AppState,
};

#[tokio::main]
async fn main() {
    // Load configuration before logging so the configured level applies
    let config_path = std::env::var("LABCORE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let (config, config_error) = match ServerConfig::load(
        std::path::Path::new(&config_path)
            .exists()
            .then_some(config_path.as_str()),
    ) {
        Ok(config) => (config, None),
        Err(e) => (ServerConfig::default(), Some(e.to_string())),
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    match config.log.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init(),
    }

    tracing::info!("Starting labcore server...");
    if let Some(e) = config_error {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }

    // Create data directory
    if let Err(e) = std::fs::create_dir_all(&config.storage.data_dir) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    // Initialize stores
    let store = LabStore::open(config.lab_db_path()).unwrap_or_else(|e| {
        tracing::error!("Failed to open lab store: {}", e);
        std::process::exit(1);
    });

    let audit_log = AuditLog::open(config.audit_db_path()).unwrap_or_else(|e| {
        tracing::error!("Failed to open audit log: {}", e);
        std::process::exit(1);
    });

    // Apply catalog seeds if a seed directory exists
    if let Some(seed_dir) = config.seed_dir() {
        match CatalogSeedLoader::load_from_directory(&seed_dir) {
            Ok(seed) if !seed.is_empty() => {
                if let Err(e) = store.apply_seed(&seed) {
                    tracing::error!("Failed to apply catalog seed from {}: {}", seed_dir.display(), e);
                    std::process::exit(1);
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to load catalog seeds: {}", e);
            }
        }
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState {
        store,
        audit: Arc::new(Mutex::new(audit_log)),
        config,
    });

    let app = build_router(state);

    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap_or_else(|e| {
        tracing::error!("Server error: {}", e);
    });

    tracing::info!("Server shut down gracefully");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
