//! SwiftMind Backend
//!
//! REST and SSE server for the SwiftMind assistant: sessions, module-routed
//! turns against the generative backend, file conversion and read-aloud.

use axum::{extract::Request, middleware::Next, response::Response, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use swiftmind_backend::api::{self, AppState};
use swiftmind_backend::config::{Config, StoreBackend, GEMINI_API_KEY_VAR};
use swiftmind_backend::orchestrator::OrchestratorConfig;
use swiftmind_backend::services::{
    DocumentConverter, EnvCredentialPrompt, GeminiClient, GenerativeBackend, IlovePdfClient,
};
use swiftmind_backend::store::{KeyValueStore, MemoryStore, ProfileStore, SqliteStore};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    message: String,
}

/// Request ID middleware - adds unique ID to each request for tracing
async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    let response = next.run(request).instrument(span).await;

    let duration = start.elapsed();
    info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status().as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match config.persistence.store_backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store; nothing survives a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = config.persistence.store_path();
            let store = SqliteStore::new(&path).await?;
            info!(path = %path, "Opened SQLite store");
            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Configuration loaded: {:?}", config);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.gemini.request_timeout_secs))
        .build()?;

    if config.gemini.api_key.is_empty() {
        warn!("{} is not set; backend calls will fail until it is", GEMINI_API_KEY_VAR);
    }
    let backend: Arc<dyn GenerativeBackend> = Arc::new(GeminiClient::new(
        http.clone(),
        config.gemini.clone(),
        Arc::new(EnvCredentialPrompt::new(GEMINI_API_KEY_VAR)),
    ));

    let converter = IlovePdfClient::from_config(http, &config.conversion)
        .map(|c| Arc::new(c) as Arc<dyn DocumentConverter>);
    if converter.is_none() {
        info!("No conversion key configured; converter module uses text extraction only");
    }

    let profiles = ProfileStore::new(open_store(&config).await?);
    let app_state = Arc::new(AppState::new(
        profiles,
        backend,
        converter,
        OrchestratorConfig::default(),
    ));

    // Reopen the workspace of the last logged-in user
    match app_state.restore_workspace().await {
        Ok(Some(user)) => info!(user_id = %user.id, "Restored logged-in user"),
        Ok(None) => info!("No user logged in"),
        Err(e) => warn!(error = %e, "Failed to restore logged-in user"),
    }

    // Build our application with routes
    let app = Router::new()
        .route("/api/health", get(health_check))
        .merge(api::router(app_state))
        // Middleware (order matters - request_id should be first)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive()); // Allow CORS for development

    // Bind to address from config
    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;

    info!("Server running on http://{}", addr);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // Setup graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals (Ctrl+C, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "Backend is healthy".to_string(),
    })
}
