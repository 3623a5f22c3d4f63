//! Upload processing pipeline
//!
//! Drives the full sequence for one uploaded video: download the object,
//! grab its first frame, encode any faces in it, match them against the
//! enrolled encodings, look the matched student up, and write the roster
//! CSV back to object storage.
//!
//! The pipeline only talks to capability traits ([`ObjectStore`],
//! [`IdentityStore`], [`FaceEncoder`], [`FrameExtractor`]), so tests swap
//! in-memory fakes for the real AWS and ONNX backends.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use rollcall_common::{csv_object_key, derive_base_name, file_name, IdentityRecord};
use rollcall_face_encoder::{EncoderError, FaceEncoder};
use rollcall_frame_extractor::{FrameError, FrameExtractor};
use rollcall_storage::{EncodingStore, IdentityStore, ObjectStore, StorageError};

/// Errors surfaced by a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Frame extraction error: {0}")]
    Frame(#[from] FrameError),

    #[error("Face encoding error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding task failed: {0}")]
    TaskJoin(String),
}

/// Pipeline settings, read from `ROLLCALL_*` environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bucket the standalone runner lists when invoked without arguments
    pub input_bucket: String,
    /// Bucket result CSVs are written to
    pub output_bucket: String,
    /// Path of the persisted enrollment file
    pub encodings_path: PathBuf,
    /// Path of the UltraFace detection model
    pub detector_model: PathBuf,
    /// Path of the MobileFaceNet embedding model
    pub embedder_model: PathBuf,
    /// Maximum encoding distance that still counts as a match
    pub match_tolerance: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_bucket: env_or("ROLLCALL_INPUT_BUCKET", "rollcall-uploads"),
            output_bucket: env_or("ROLLCALL_OUTPUT_BUCKET", "rollcall-results"),
            encodings_path: PathBuf::from(env_or("ROLLCALL_ENCODINGS", "encodings.bin")),
            detector_model: PathBuf::from(env_or(
                "ROLLCALL_DETECTOR_MODEL",
                "models/ultraface-rfb-320.onnx",
            )),
            embedder_model: PathBuf::from(env_or(
                "ROLLCALL_EMBEDDER_MODEL",
                "models/mobilefacenet.onnx",
            )),
            match_tolerance: std::env::var("ROLLCALL_MATCH_TOLERANCE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.6),
        }
    }
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Outcome of one pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub status: u16,
    pub message: String,
}

/// Capability handed to the event receiver: process one uploaded object
#[async_trait]
pub trait UploadHandler: Send + Sync {
    async fn handle_upload(&self, bucket: &str, key: &str) -> PipelineReport;
}

/// The upload processing pipeline, wired to its storage and model backends
pub struct Pipeline {
    objects: Arc<dyn ObjectStore>,
    identities: Arc<dyn IdentityStore>,
    encoder: Arc<dyn FaceEncoder>,
    extractor: Arc<dyn FrameExtractor>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        identities: Arc<dyn IdentityStore>,
        encoder: Arc<dyn FaceEncoder>,
        extractor: Arc<dyn FrameExtractor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            objects,
            identities,
            encoder,
            extractor,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process one uploaded video and report the outcome
    ///
    /// Every failure is converted to a 500 report at this single boundary,
    /// so callers never see a partial result.
    pub async fn run(&self, bucket: &str, key: &str) -> PipelineReport {
        let base_name = derive_base_name(key).to_string();
        match self.process(bucket, key, &base_name).await {
            Ok(()) => {
                let message = format!("CSV file {base_name}.csv generated and uploaded to S3");
                info!("{}", message);
                PipelineReport {
                    status: 200,
                    message,
                }
            }
            Err(e) => {
                error!("Error processing the video: {}", e);
                PipelineReport {
                    status: 500,
                    message: format!("Error processing the video: {e}"),
                }
            }
        }
    }

    async fn process(&self, bucket: &str, key: &str, base_name: &str) -> Result<(), PipelineError> {
        // Scoped working directory, removed on every exit path
        let workdir = tempfile::tempdir()?;

        let video_name = file_name(key);
        let video_path = workdir.path().join(video_name);
        self.objects
            .download_to_path(bucket, key, &video_path)
            .await?;

        let frame_stem = derive_base_name(video_name);
        let frame_path = workdir.path().join(format!("{frame_stem}_frame.jpeg"));
        self.extractor
            .extract_first_frame(&video_path, &frame_path)
            .await?;

        // Reload enrollments on every invocation so newly enrolled people
        // take effect without a restart
        let store = EncodingStore::load(&self.config.encodings_path)?;

        let encoder = Arc::clone(&self.encoder);
        let encodings = tokio::task::spawn_blocking(move || encoder.encode(&frame_path))
            .await
            .map_err(|e| PipelineError::TaskJoin(e.to_string()))??;

        let matched = encodings
            .iter()
            .find_map(|probe| store.first_match(probe, self.config.match_tolerance));

        let rows = match matched {
            Some(name) => {
                info!("Matched face in {}/{} to {}", bucket, key, name);
                self.identities.find_by_name(name).await?
            }
            None => {
                info!("No enrolled face matched in {}/{}", bucket, key);
                Vec::new()
            }
        };

        let body = to_csv(&rows);
        self.objects
            .put_object(
                &self.config.output_bucket,
                &csv_object_key(base_name),
                body.as_bytes(),
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl UploadHandler for Pipeline {
    async fn handle_upload(&self, bucket: &str, key: &str) -> PipelineReport {
        self.run(bucket, key).await
    }
}

/// Serialize identity rows as comma-joined columns and newline-joined rows
///
/// No header row, no trailing newline, and no quoting or escaping: embedded
/// commas and newlines pass through unmodified.
#[must_use]
pub fn to_csv(rows: &[IdentityRecord]) -> String {
    rows.iter()
        .map(|row| format!("{},{},{}", row.name, row.major, row.year))
        .collect::<Vec<_>>()
        .join("\n")
}
