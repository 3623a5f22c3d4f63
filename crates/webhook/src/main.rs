//! Webhook Server Binary Entry Point

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall_face_encoder::{EncoderConfig, OnnxFaceEncoder};
use rollcall_frame_extractor::FfmpegFrameExtractor;
use rollcall_orchestrator::{Pipeline, PipelineConfig};
use rollcall_storage::{DynamoConfig, DynamoDbIdentityStore, S3Config, S3ObjectStore};
use rollcall_webhook::{start_server, AckMode, ApiState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rollcall_webhook=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get bind address from environment or use default
    let addr = std::env::var("ROLLCALL_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    // Wire the pipeline to its real backends
    let config = PipelineConfig::default();
    let objects = Arc::new(S3ObjectStore::new(S3Config::default()).await?);
    let identities = Arc::new(DynamoDbIdentityStore::new(DynamoConfig::default()).await?);
    let encoder = Arc::new(OnnxFaceEncoder::new(
        &config.detector_model,
        &config.embedder_model,
        EncoderConfig::default(),
    ));
    let pipeline = Pipeline::new(
        objects,
        identities,
        encoder,
        Arc::new(FfmpegFrameExtractor),
        config,
    );

    let state = ApiState::new(Arc::new(pipeline), AckMode::from_env());

    tracing::info!("Starting Rollcall webhook server");
    start_server(&addr, state).await?;

    Ok(())
}
