//! Persisted collection of enrolled face encodings
//!
//! Names and encodings are parallel sequences: `names[i]` labels
//! `encodings[i]`. The collection is serialized as a single bincode blob and
//! reloaded per pipeline invocation, so enrollment changes take effect
//! without a restart.

use crate::{StorageError, StorageResult};
use rollcall_common::FaceEncoding;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Enrolled face encodings, labeled by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncodingStore {
    names: Vec<String>,
    encodings: Vec<FaceEncoding>,
}

impl EncodingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a bincode blob on disk
    pub fn load(path: &Path) -> StorageResult<Self> {
        let bytes = std::fs::read(path)?;
        let store: EncodingStore = bincode::deserialize(&bytes)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        if store.names.len() != store.encodings.len() {
            return Err(StorageError::SerializationError(format!(
                "parallel sequences disagree: {} names vs {} encodings",
                store.names.len(),
                store.encodings.len()
            )));
        }

        tracing::debug!(
            "loaded {} enrolled encodings from {}",
            store.names.len(),
            path.display()
        );
        Ok(store)
    }

    /// Serialize the store to a bincode blob on disk
    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let bytes =
            bincode::serialize(self).map_err(|e| StorageError::SerializationError(e.to_string()))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn push(&mut self, name: impl Into<String>, encoding: FaceEncoding) {
        self.names.push(name.into());
        self.encodings.push(encoding);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name of the first enrolled encoding within `tolerance` of the probe.
    ///
    /// Ties are broken by enrollment order: the lowest index wins. Returns
    /// `None` when nothing is within tolerance.
    #[must_use]
    pub fn first_match(&self, probe: &FaceEncoding, tolerance: f32) -> Option<&str> {
        self.encodings
            .iter()
            .position(|known| probe.distance(known) <= tolerance)
            .map(|i| self.names[i].as_str())
    }
}
