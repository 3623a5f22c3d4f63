//! HTTP request handlers for the webhook endpoints

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{AckMode, ApiState, EventPayload, HealthResponse};
use rollcall_orchestrator::UploadHandler;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Receive a forwarded upload event
///
/// Always acknowledges with 200 "OK" so the notification source never
/// retries. Processing failures are logged, not returned: the uploader
/// already succeeded and has nothing to act on.
pub async fn receive_event(
    State(state): State<ApiState>,
    Json(payload): Json<EventPayload>,
) -> impl IntoResponse {
    match (payload.bucket, payload.key) {
        (Some(bucket), Some(key)) => {
            info!("Received upload event for s3://{}/{}", bucket, key);
            match state.ack {
                AckMode::Blocking => {
                    process_and_log(Arc::clone(&state.handler), bucket, key).await;
                }
                AckMode::Deferred => {
                    let handler = Arc::clone(&state.handler);
                    tokio::spawn(process_and_log(handler, bucket, key));
                }
            }
        }
        _ => {
            warn!("Event payload missing bucket or key; ignoring");
        }
    }

    (StatusCode::OK, "OK")
}

/// Run the pipeline for one upload and log the outcome
async fn process_and_log(handler: Arc<dyn UploadHandler>, bucket: String, key: String) {
    let report = handler.handle_upload(&bucket, &key).await;
    if report.status == 200 {
        info!("Processed s3://{}/{}: {}", bucket, key, report.message);
    } else {
        error!(
            "Processing s3://{}/{} failed: {}",
            bucket, key, report.message
        );
    }
}
