//! Upload event webhook
//!
//! Receives S3 upload notifications forwarded as JSON and hands each one to
//! the processing pipeline. Two acknowledgement modes:
//! - Blocking: acknowledge after the pipeline finishes (default)
//! - Deferred: acknowledge immediately and process in a background task
//!
//! Either way the response is 200 "OK"; the notification source has no
//! retry path worth triggering.

mod handlers;
mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use rollcall_orchestrator::UploadHandler;

pub use handlers::*;
pub use types::*;

/// When the webhook acknowledges relative to processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Acknowledge after the pipeline finishes
    #[default]
    Blocking,
    /// Acknowledge immediately and process in a background task
    Deferred,
}

impl AckMode {
    /// Read from the `ROLLCALL_ACK_MODE` environment variable
    ///
    /// Anything other than "deferred" falls back to [`AckMode::Blocking`].
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var("ROLLCALL_ACK_MODE").as_deref() {
            Ok("deferred") => Self::Deferred,
            _ => Self::Blocking,
        }
    }
}

/// Webhook state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Pipeline entry point for uploaded objects
    pub handler: Arc<dyn UploadHandler>,
    /// Acknowledgement mode
    pub ack: AckMode,
}

impl ApiState {
    /// Create new webhook state
    #[must_use]
    pub fn new(handler: Arc<dyn UploadHandler>, ack: AckMode) -> Self {
        Self { handler, ack }
    }
}

/// Build the webhook router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Upload event intake
        .route("/webhook", post(receive_event))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the webhook server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting webhook server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
