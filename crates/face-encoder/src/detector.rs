//! UltraFace RFB-320 face detection
//!
//! Runs the detector over a caller-provided session. Scores arrive as
//! (background, face) logit pairs per prior; boxes as regression offsets
//! decoded against the fixed prior set in [`crate::anchors`].

use crate::anchors::{self, Prior, PRIOR_COUNT};
use crate::{EncoderConfig, EncoderError};
use image::RgbImage;
use ndarray::Array4;
use once_cell::sync::Lazy;
use ort::{
    session::{Session, SessionOutputs},
    value::TensorRef,
};
use tracing::debug;

/// Model input size for RFB-320
pub(crate) const INPUT_WIDTH: u32 = 320;
pub(crate) const INPUT_HEIGHT: u32 = 240;

// UltraFace variance parameters for box decoding
const CENTER_VARIANCE: f32 = 0.1;
const SIZE_VARIANCE: f32 = 0.2;

static PRIORS: Lazy<Vec<Prior>> = Lazy::new(anchors::ultraface_priors);

/// Face bounding box (normalized coordinates)
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    #[must_use]
    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[must_use]
    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    #[must_use]
    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box
    #[must_use]
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 < x1 || y2 < y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        intersection / (self.area() + other.area() - intersection)
    }
}

/// A detected face
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFace {
    /// Detection confidence (0.0-1.0)
    pub confidence: f32,
    /// Normalized bounding box
    pub bbox: BoundingBox,
}

/// Detect all faces in an image using a pre-loaded UltraFace session
pub(crate) fn detect_faces(
    session: &mut Session,
    image: &RgbImage,
    config: &EncoderConfig,
) -> Result<Vec<DetectedFace>, EncoderError> {
    let input = preprocess(image);

    let input_tensor = TensorRef::from_array_view(input.view())
        .map_err(|e| EncoderError::InferenceError(e.to_string()))?;

    let outputs = session
        .run(ort::inputs![input_tensor])
        .map_err(|e| EncoderError::InferenceError(e.to_string()))?;

    let faces = postprocess(outputs, config)?;
    let kept = non_maximum_suppression(faces, config.nms_threshold);

    debug!("detected {} faces after NMS", kept.len());
    Ok(kept)
}

/// Resize to 320x240 and normalize to CHW with `(pixel - 127) / 128`
fn preprocess(image: &RgbImage) -> Array4<f32> {
    let resized = image::imageops::resize(
        image,
        INPUT_WIDTH,
        INPUT_HEIGHT,
        image::imageops::FilterType::Triangle,
    );

    let mut input = Array4::<f32>::zeros((1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize));
    for y in 0..INPUT_HEIGHT as usize {
        for x in 0..INPUT_WIDTH as usize {
            let pixel = resized.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                input[[0, c, y, x]] = (f32::from(pixel[c]) - 127.0) / 128.0;
            }
        }
    }

    input
}

fn postprocess(
    outputs: SessionOutputs,
    config: &EncoderConfig,
) -> Result<Vec<DetectedFace>, EncoderError> {
    // Score tensor [1, N, 2]; exports name it either "scores" or "confidences"
    let scores_value = outputs
        .get("scores")
        .or_else(|| outputs.get("confidences"))
        .ok_or_else(|| {
            EncoderError::PostprocessingError("scores/confidences output not found".into())
        })?;

    let (scores_shape, scores_data) = scores_value.try_extract_tensor::<f32>().map_err(|e| {
        EncoderError::PostprocessingError(format!("Failed to extract scores: {e}"))
    })?;

    // Box tensor [1, N, 4]
    let boxes_value = outputs
        .get("boxes")
        .ok_or_else(|| EncoderError::PostprocessingError("boxes output not found".into()))?;

    let (boxes_shape, boxes_data) = boxes_value.try_extract_tensor::<f32>().map_err(|e| {
        EncoderError::PostprocessingError(format!("Failed to extract boxes: {e}"))
    })?;

    if scores_shape.len() != 3 || boxes_shape.len() != 3 {
        return Err(EncoderError::PostprocessingError(format!(
            "Invalid output shapes: scores={scores_shape:?}, boxes={boxes_shape:?}"
        )));
    }

    let num_boxes = scores_shape[1] as usize;
    if boxes_shape[1] as usize != num_boxes {
        return Err(EncoderError::PostprocessingError(format!(
            "Mismatch between scores and boxes: scores[1]={} vs boxes[1]={}",
            num_boxes, boxes_shape[1]
        )));
    }
    if num_boxes != PRIOR_COUNT {
        return Err(EncoderError::PostprocessingError(format!(
            "Prior count mismatch: expected {PRIOR_COUNT} boxes, model outputs {num_boxes}"
        )));
    }

    let decoded = anchors::decode(&boxes_data, &PRIORS, CENTER_VARIANCE, SIZE_VARIANCE);

    let mut faces = Vec::with_capacity(num_boxes / 2);
    for i in 0..num_boxes {
        // Raw (background, face) logits per box; softmax to a probability
        let exp_bg = scores_data[i * 2].exp();
        let exp_face = scores_data[i * 2 + 1].exp();
        let confidence = exp_face / (exp_bg + exp_face);

        if confidence < config.confidence_threshold {
            continue;
        }

        let [x1, y1, x2, y2] = decoded[i];
        let bbox = BoundingBox {
            x1: x1.clamp(0.0, 1.0),
            y1: y1.clamp(0.0, 1.0),
            x2: x2.clamp(0.0, 1.0),
            y2: y2.clamp(0.0, 1.0),
        };

        if bbox.x2 <= bbox.x1 || bbox.y2 <= bbox.y1 {
            continue;
        }

        faces.push(DetectedFace { confidence, bbox });
    }

    faces.retain(|face| {
        face.bbox.width() >= config.min_box_size && face.bbox.height() >= config.min_box_size
    });
    faces.retain(|face| {
        face.bbox.x1 > config.edge_margin
            && face.bbox.y1 > config.edge_margin
            && face.bbox.x2 < 1.0 - config.edge_margin
            && face.bbox.y2 < 1.0 - config.edge_margin
    });

    Ok(faces)
}

/// Drop overlapping detections, keeping the highest-confidence box
fn non_maximum_suppression(mut faces: Vec<DetectedFace>, nms_threshold: f32) -> Vec<DetectedFace> {
    if faces.is_empty() {
        return faces;
    }

    faces.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::with_capacity(faces.len());
    let mut suppressed = vec![false; faces.len()];

    for i in 0..faces.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(faces[i].clone());

        for j in (i + 1)..faces.len() {
            if !suppressed[j] && faces[i].bbox.iou(&faces[j].bbox) > nms_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> DetectedFace {
        DetectedFace {
            confidence,
            bbox: BoundingBox { x1, y1, x2, y2 },
        }
    }

    #[test]
    fn test_bounding_box_geometry() {
        let bbox = BoundingBox {
            x1: 0.2,
            y1: 0.3,
            x2: 0.6,
            y2: 0.7,
        };

        assert!((bbox.width() - 0.4).abs() < 1e-3);
        assert!((bbox.height() - 0.4).abs() < 1e-3);
        assert!((bbox.area() - 0.16).abs() < 1e-3);
    }

    #[test]
    fn test_bounding_box_iou() {
        let a = BoundingBox {
            x1: 0.0,
            y1: 0.0,
            x2: 0.5,
            y2: 0.5,
        };
        let b = BoundingBox {
            x1: 0.25,
            y1: 0.25,
            x2: 0.75,
            y2: 0.75,
        };

        // Intersection 0.0625, union 0.4375
        assert!((a.iou(&b) - 0.1428).abs() < 1e-3);

        let disjoint = BoundingBox {
            x1: 0.8,
            y1: 0.8,
            x2: 0.9,
            y2: 0.9,
        };
        assert_eq!(a.iou(&disjoint), 0.0);
    }

    #[test]
    fn test_nms_suppresses_overlaps() {
        let faces = vec![
            face(0.9, 0.1, 0.1, 0.5, 0.5),
            face(0.8, 0.12, 0.12, 0.52, 0.52), // heavy overlap with the first
            face(0.7, 0.6, 0.6, 0.9, 0.9),     // disjoint
        ];

        let kept = non_maximum_suppression(faces, 0.25);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_highest_confidence_first() {
        let faces = vec![
            face(0.6, 0.6, 0.6, 0.9, 0.9),
            face(0.95, 0.1, 0.1, 0.5, 0.5),
        ];

        let kept = non_maximum_suppression(faces, 0.25);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let image = RgbImage::new(64, 48);
        let input = preprocess(&image);

        assert_eq!(input.shape(), [1, 3, 240, 320]);
        // Black pixels normalize to (0 - 127) / 128
        assert!((input[[0, 0, 0, 0]] - (-127.0 / 128.0)).abs() < 1e-6);
    }
}
