/// Standalone pipeline runner
///
/// Processes a single uploaded video end to end. Invoked with an explicit
/// bucket and key it processes that object; invoked with no arguments it
/// processes the first object in the configured input bucket.
use std::sync::Arc;

use tracing::{error, info};

use rollcall_face_encoder::{EncoderConfig, OnnxFaceEncoder};
use rollcall_frame_extractor::FfmpegFrameExtractor;
use rollcall_orchestrator::{Pipeline, PipelineConfig};
use rollcall_storage::{DynamoConfig, DynamoDbIdentityStore, ObjectStore, S3Config, S3ObjectStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Rollcall pipeline runner v{}", env!("CARGO_PKG_VERSION"));

    let config = PipelineConfig::default();

    let objects: Arc<dyn ObjectStore> = match S3ObjectStore::new(S3Config::default()).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to create S3 client: {}", e);
            std::process::exit(1);
        }
    };
    let identities = match DynamoDbIdentityStore::new(DynamoConfig::default()).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to create DynamoDB client: {}", e);
            std::process::exit(1);
        }
    };
    let encoder = Arc::new(OnnxFaceEncoder::new(
        &config.detector_model,
        &config.embedder_model,
        EncoderConfig::default(),
    ));

    let args: Vec<String> = std::env::args().collect();
    let (bucket, key) = match args.len() {
        // No arguments: process the first object in the input bucket
        1 => match objects.first_key(&config.input_bucket).await {
            Ok(Some(key)) => (config.input_bucket.clone(), key),
            Ok(None) => {
                error!("No objects found in bucket {}", config.input_bucket);
                std::process::exit(1);
            }
            Err(e) => {
                error!("Failed to list bucket {}: {}", config.input_bucket, e);
                std::process::exit(1);
            }
        },
        3 => (args[1].clone(), args[2].clone()),
        _ => {
            eprintln!("Usage: {} [<bucket> <key>]", args[0]);
            std::process::exit(1);
        }
    };

    info!("Processing s3://{}/{}", bucket, key);

    let pipeline = Pipeline::new(
        Arc::clone(&objects),
        identities,
        encoder,
        Arc::new(FfmpegFrameExtractor),
        config,
    );

    let report = pipeline.run(&bucket, &key).await;

    println!("\n=== Pipeline Result ===");
    println!("Status:  {}", report.status);
    println!("Message: {}", report.message);

    if report.status != 200 {
        std::process::exit(1);
    }
}
