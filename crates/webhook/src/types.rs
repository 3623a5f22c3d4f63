//! Webhook request and response types

use serde::{Deserialize, Serialize};

/// Upload event forwarded from the S3 notification
///
/// Both fields are optional so malformed or unrelated events can be
/// acknowledged without processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    /// Bucket the object was uploaded to
    #[serde(default)]
    pub bucket: Option<String>,
    /// Key of the uploaded object
    #[serde(default)]
    pub key: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}
