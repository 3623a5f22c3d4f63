/// Shared types for the rollcall pipeline
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a face encoding vector.
pub const ENCODING_DIM: usize = 128;

/// Errors for encoding construction
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("encoding has {got} values, expected {expected}")]
    WrongLength { got: usize, expected: usize },
}

/// A fixed-length face embedding, L2-normalized by the encoder.
///
/// Two encodings belong to the same person when their Euclidean distance is
/// at or below the match tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceEncoding(Vec<f32>);

impl FaceEncoding {
    pub fn from_vec(values: Vec<f32>) -> Result<Self, EncodingError> {
        if values.len() != ENCODING_DIM {
            return Err(EncodingError::WrongLength {
                got: values.len(),
                expected: ENCODING_DIM,
            });
        }
        Ok(Self(values))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance to another encoding.
    #[must_use]
    pub fn distance(&self, other: &FaceEncoding) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

/// One identity row from the student table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub name: String,
    pub major: String,
    pub year: String,
}

/// Strip the final extension from an object key, keeping any prefix.
///
/// Only a dot inside the last path component counts, and a leading dot marks
/// a hidden file rather than an extension: `videos/clip.mp4` becomes
/// `videos/clip`, while `.bashrc` and `dir.v2/raw` pass through unchanged.
#[must_use]
pub fn derive_base_name(key: &str) -> &str {
    let dot = match key.rfind('.') {
        Some(i) => i,
        None => return key,
    };
    let component_start = key.rfind('/').map_or(0, |i| i + 1);
    if dot <= component_start {
        return key;
    }
    &key[..dot]
}

/// Final path component of an object key.
#[must_use]
pub fn file_name(key: &str) -> &str {
    match key.rfind('/') {
        Some(i) => &key[i + 1..],
        None => key,
    }
}

/// Object key of the CSV produced for a video.
#[must_use]
pub fn csv_object_key(base_name: &str) -> String {
    format!("{base_name}.csv")
}
