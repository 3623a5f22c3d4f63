//! Face detection and encoding via ONNX Runtime
//!
//! Detects faces with the `UltraFace` RFB-320 model, then encodes each
//! detected face with a `MobileFaceNet` embedding model into a 128-d
//! L2-normalized vector. Sessions are loaded once and cached, so repeated
//! invocations pay the model-load cost a single time.
//!
//! # Example
//! ```no_run
//! use rollcall_face_encoder::{EncoderConfig, FaceEncoder, OnnxFaceEncoder};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let encoder = OnnxFaceEncoder::new(
//!     "models/ultraface-rfb-320.onnx",
//!     "models/mobilefacenet.onnx",
//!     EncoderConfig::default(),
//! );
//!
//! let encodings = encoder.encode(Path::new("frame.jpeg"))?;
//! println!("{} faces encoded", encodings.len());
//! # Ok(())
//! # }
//! ```

mod anchors;
pub mod detector;
mod embedder;

pub use detector::{BoundingBox, DetectedFace};

use image::RgbImage;
use once_cell::sync::OnceCell;
use ort::session::Session;
use rollcall_common::FaceEncoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Configuration for face detection and encoding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Minimum confidence threshold for face detections (0.0-1.0)
    pub confidence_threshold: f32,
    /// `IoU` threshold for non-maximum suppression (0.0-1.0)
    pub nms_threshold: f32,
    /// Minimum box size as fraction of image (e.g., 0.02 = 2%)
    pub min_box_size: f32,
    /// Reject detections within this margin of edges (e.g., 0.05 = 5%)
    pub edge_margin: f32,
    /// Padding around a detected box before cropping, as a fraction of box size
    pub crop_margin: f32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.50, // UltraFace threshold (softmax output)
            nms_threshold: 0.25,
            min_box_size: 0.01,
            edge_margin: 0.01,
            crop_margin: 0.2,
        }
    }
}

/// Errors that can occur during face encoding
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("Failed to load ONNX model: {0}")]
    ModelLoadError(String),

    #[error("Failed to load image: {0}")]
    ImageLoadError(String),

    #[error("Failed to run inference: {0}")]
    InferenceError(String),

    #[error("Postprocessing failed: {0}")]
    PostprocessingError(String),

    #[error("Failed to lock session mutex: {0}")]
    SessionLockError(String),
}

/// Face encoding trait
pub trait FaceEncoder: Send + Sync {
    /// Detect every face in the image and produce one encoding per face
    fn encode(&self, image_path: &Path) -> Result<Vec<FaceEncoding>, EncoderError>;
}

/// ONNX-backed face encoder with model caching
pub struct OnnxFaceEncoder {
    detector_model: PathBuf,
    embedder_model: PathBuf,
    config: EncoderConfig,
    /// Cached ONNX Sessions - loaded once and reused across invocations.
    /// Wrapped in Mutex for interior mutability (Session::run requires &mut self)
    detector_session: Arc<OnceCell<Mutex<Session>>>,
    embedder_session: Arc<OnceCell<Mutex<Session>>>,
}

impl OnnxFaceEncoder {
    /// Create a new encoder; models load lazily on first use
    pub fn new(
        detector_model: impl AsRef<Path>,
        embedder_model: impl AsRef<Path>,
        config: EncoderConfig,
    ) -> Self {
        Self {
            detector_model: detector_model.as_ref().to_path_buf(),
            embedder_model: embedder_model.as_ref().to_path_buf(),
            config,
            detector_session: Arc::new(OnceCell::new()),
            embedder_session: Arc::new(OnceCell::new()),
        }
    }

    /// Get or load an ONNX Session (cached after first load)
    fn session<'a>(
        cell: &'a OnceCell<Mutex<Session>>,
        model_path: &Path,
    ) -> Result<&'a Mutex<Session>, EncoderError> {
        cell.get_or_try_init(|| {
            info!(
                "Loading ONNX model from {} (first time only)",
                model_path.display()
            );

            let session = Session::builder()
                .map_err(|e| EncoderError::ModelLoadError(e.to_string()))?
                .commit_from_file(model_path)
                .map_err(|e| EncoderError::ModelLoadError(e.to_string()))?;

            Ok(Mutex::new(session))
        })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(&self, image_path: &Path) -> Result<Vec<FaceEncoding>, EncoderError> {
        let image = image::open(image_path)
            .map_err(|e| EncoderError::ImageLoadError(e.to_string()))?
            .to_rgb8();

        let faces = {
            let session_mutex = Self::session(&self.detector_session, &self.detector_model)?;
            let mut session = session_mutex
                .lock()
                .map_err(|e| EncoderError::SessionLockError(e.to_string()))?;

            detector::detect_faces(&mut session, &image, &self.config)?
        };

        debug!("{} faces detected in {}", faces.len(), image_path.display());

        if faces.is_empty() {
            return Ok(Vec::new());
        }

        let session_mutex = Self::session(&self.embedder_session, &self.embedder_model)?;
        // Lock once for all faces
        let mut session = session_mutex
            .lock()
            .map_err(|e| EncoderError::SessionLockError(e.to_string()))?;

        let mut encodings = Vec::with_capacity(faces.len());
        for face in &faces {
            let crop = crop_face(&image, &face.bbox, self.config.crop_margin);
            encodings.push(embedder::embed_face(&mut session, &crop)?);
        }

        Ok(encodings)
    }
}

/// Cut a detected box out of the frame, padded by `margin` of the box size
fn crop_face(image: &RgbImage, bbox: &BoundingBox, margin: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (w, h) = (width as f32, height as f32);

    let pad_x = bbox.width() * margin;
    let pad_y = bbox.height() * margin;

    let x1 = ((bbox.x1 - pad_x) * w).max(0.0) as u32;
    let y1 = ((bbox.y1 - pad_y) * h).max(0.0) as u32;
    let x2 = ((bbox.x2 + pad_x) * w).min(w) as u32;
    let y2 = ((bbox.y2 + pad_y) * h).min(h) as u32;

    let crop_w = x2.saturating_sub(x1).max(1);
    let crop_h = y2.saturating_sub(y1).max(1);

    image::imageops::crop_imm(image, x1, y1, crop_w, crop_h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EncoderConfig::default();
        assert_eq!(config.confidence_threshold, 0.50);
        assert_eq!(config.nms_threshold, 0.25);
        assert_eq!(config.min_box_size, 0.01);
        assert_eq!(config.edge_margin, 0.01);
        assert_eq!(config.crop_margin, 0.2);
    }

    #[test]
    fn test_crop_face_without_margin() {
        let image = RgbImage::new(100, 100);
        let bbox = BoundingBox {
            x1: 0.2,
            y1: 0.2,
            x2: 0.6,
            y2: 0.6,
        };

        let crop = crop_face(&image, &bbox, 0.0);
        assert_eq!(crop.dimensions(), (40, 40));
    }

    #[test]
    fn test_crop_face_margin_expands_box() {
        let image = RgbImage::new(100, 100);
        let bbox = BoundingBox {
            x1: 0.2,
            y1: 0.2,
            x2: 0.6,
            y2: 0.6,
        };

        // 0.25 of a 0.4-wide box pads 0.1 on each side
        let crop = crop_face(&image, &bbox, 0.25);
        assert_eq!(crop.dimensions(), (60, 60));
    }

    #[test]
    fn test_crop_face_clamps_at_edges() {
        let image = RgbImage::new(100, 100);
        let bbox = BoundingBox {
            x1: 0.0,
            y1: 0.0,
            x2: 0.3,
            y2: 0.3,
        };

        let crop = crop_face(&image, &bbox, 0.5);
        // Padding cannot extend past the frame
        assert_eq!(crop.dimensions(), (45, 45));
    }

    #[test]
    #[ignore] // Run manually with: cargo test --package rollcall-face-encoder test_encode_real_image -- --ignored --nocapture
    fn test_encode_real_image() {
        let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
        let detector_model = format!("{manifest_dir}/../../models/ultraface-rfb-320.onnx");
        let embedder_model = format!("{manifest_dir}/../../models/mobilefacenet.onnx");

        if !Path::new(&detector_model).exists() || !Path::new(&embedder_model).exists() {
            println!("Models not found under models/, skipping");
            return;
        }

        let test_image = "/tmp/test_face_frame.jpg";
        if !Path::new(test_image).exists() {
            println!("Test image not found at {test_image}, skipping");
            return;
        }

        let encoder =
            OnnxFaceEncoder::new(&detector_model, &embedder_model, EncoderConfig::default());
        let encodings = encoder.encode(Path::new(test_image)).expect("encode failed");

        println!("{} faces encoded", encodings.len());
        for (i, encoding) in encodings.iter().enumerate() {
            let norm: f32 = encoding
                .as_slice()
                .iter()
                .map(|v| v * v)
                .sum::<f32>()
                .sqrt();
            println!("  [{i}] norm: {norm:.4}");
            assert!((norm - 1.0).abs() < 1e-3);
        }
    }
}
