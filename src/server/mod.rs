//! HTTP service
//!
//! `POST /api/remove-bg` takes a multipart upload, runs extraction plus
//! fragment filtering and answers with a PNG. `GET /api/health` reports
//! liveness. Every other path is served from the static frontend directory,
//! falling back to its `index.html`.

mod handlers;

pub use handlers::ApiError;

use crate::{
    config::{CleanupConfig, ServerConfig},
    error::Result,
    extractor::ForegroundExtractor,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::{
    cors::CorsLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

/// Shared state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<dyn ForegroundExtractor>,
    /// Settings used when a request does not override them
    pub defaults: CleanupConfig,
    /// Bounds the number of images processed at once
    pub jobs: Arc<Semaphore>,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    #[must_use]
    pub fn new(config: &ServerConfig, extractor: Arc<dyn ForegroundExtractor>) -> Self {
        Self {
            extractor,
            defaults: config.cleanup.clone(),
            jobs: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            static_dir: config.static_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let index = state.static_dir.join("index.html");
    let frontend = ServeDir::new(&state.static_dir).fallback(ServeFile::new(index));
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/api/remove-bg", post(handlers::remove_background))
        .route("/api/health", get(handlers::health))
        .fallback_service(frontend)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `config.address()` and serve until Ctrl-C
///
/// # Errors
/// - Invalid server configuration
/// - Address cannot be bound
pub async fn serve(config: ServerConfig, extractor: Arc<dyn ForegroundExtractor>) -> Result<()> {
    config.validate()?;
    let address = config.address();
    let app = build_router(AppState::new(&config, extractor));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        address = %address,
        static_dir = %config.static_dir.display(),
        max_jobs = config.max_concurrent_jobs,
        "Server running on http://{address}"
    );
    tracing::info!("API endpoint: POST /api/remove-bg");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
