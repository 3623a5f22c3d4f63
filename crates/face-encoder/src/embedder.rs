//! MobileFaceNet embedding
//!
//! Turns a cropped face into a 128-dimensional L2-normalized encoding. The
//! output tensor is looked up by the model's declared output name, so exports
//! with different naming conventions all work.

use crate::EncoderError;
use image::RgbImage;
use ndarray::Array4;
use ort::{session::Session, value::TensorRef};
use rollcall_common::{FaceEncoding, ENCODING_DIM};

/// Model input size
pub(crate) const INPUT_SIZE: u32 = 112;

/// Encode a cropped face using a pre-loaded embedding session
pub(crate) fn embed_face(
    session: &mut Session,
    face: &RgbImage,
) -> Result<FaceEncoding, EncoderError> {
    let input = preprocess(face);

    let input_tensor = TensorRef::from_array_view(input.view())
        .map_err(|e| EncoderError::InferenceError(e.to_string()))?;

    let output_name = session
        .outputs
        .first()
        .map(|output| output.name.clone())
        .ok_or_else(|| {
            EncoderError::PostprocessingError("embedding model declares no outputs".into())
        })?;

    let outputs = session
        .run(ort::inputs![input_tensor])
        .map_err(|e| EncoderError::InferenceError(e.to_string()))?;

    let value = outputs.get(output_name.as_str()).ok_or_else(|| {
        EncoderError::PostprocessingError(format!("output `{output_name}` missing from results"))
    })?;

    let (shape, data) = value.try_extract_tensor::<f32>().map_err(|e| {
        EncoderError::PostprocessingError(format!("Failed to extract embedding: {e}"))
    })?;

    let total: usize = shape.iter().map(|&d| d as usize).product();
    if total != ENCODING_DIM {
        return Err(EncoderError::PostprocessingError(format!(
            "embedding has {total} values (shape {shape:?}), expected {ENCODING_DIM}"
        )));
    }

    FaceEncoding::from_vec(normalize(data))
        .map_err(|e| EncoderError::PostprocessingError(e.to_string()))
}

/// Resize to 112x112 and normalize to CHW with `(pixel - 127.5) / 128`
fn preprocess(face: &RgbImage) -> Array4<f32> {
    let resized = image::imageops::resize(
        face,
        INPUT_SIZE,
        INPUT_SIZE,
        image::imageops::FilterType::Triangle,
    );

    let side = INPUT_SIZE as usize;
    let mut input = Array4::<f32>::zeros((1, 3, side, side));
    for y in 0..side {
        for x in 0..side {
            let pixel = resized.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                input[[0, c, y, x]] = (f32::from(pixel[c]) - 127.5) / 128.0;
            }
        }
    }

    input
}

/// Scale to unit length so encodings compare by plain Euclidean distance
fn normalize(values: &[f32]) -> Vec<f32> {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter().map(|v| v / norm).collect()
    } else {
        values.to_vec()
    }
}
