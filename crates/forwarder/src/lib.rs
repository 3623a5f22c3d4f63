//! Notification forwarder
//!
//! Reads an S3 event notification document, extracts the bucket and key of
//! the first record, and forwards them to the webhook as a flat JSON
//! payload (`{"bucket": ..., "key": ...}`).

use anyhow::{bail, Context as _, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// S3 event notification document (only the fields the forwarder reads)
#[derive(Debug, Deserialize)]
pub struct S3Notification {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3Record>,
}

#[derive(Debug, Deserialize)]
pub struct S3Record {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct S3Object {
    pub key: String,
}

/// Bucket and key taken from the first record of a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadEvent {
    pub bucket: String,
    pub key: String,
}

/// Parse a notification document and take its first record
pub fn extract_event(document: &str) -> Result<UploadEvent> {
    let notification: S3Notification =
        serde_json::from_str(document).context("Failed to parse notification JSON")?;

    let Some(record) = notification.records.into_iter().next() else {
        bail!("No S3 event data found in notification");
    };

    Ok(UploadEvent {
        bucket: record.s3.bucket.name,
        key: record.s3.object.key,
    })
}

/// POST the event to the webhook and return the response body
pub async fn forward(url: &str, event: &UploadEvent) -> Result<String> {
    let client = reqwest::Client::new();
    let response = client
        .post(url)
        .json(event)
        .send()
        .await
        .with_context(|| format!("Failed to reach webhook at {url}"))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read webhook response")?;

    if !status.is_success() {
        bail!("Webhook answered {status}: {body}");
    }

    info!("Webhook answered: {}", body);
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_event_from_notification() {
        let document = r#"{
            "Records": [
                {
                    "eventVersion": "2.1",
                    "eventSource": "aws:s3",
                    "eventName": "ObjectCreated:Put",
                    "s3": {
                        "s3SchemaVersion": "1.0",
                        "bucket": {
                            "name": "rollcall-uploads",
                            "arn": "arn:aws:s3:::rollcall-uploads"
                        },
                        "object": {
                            "key": "videos/clip.mp4",
                            "size": 1048576
                        }
                    }
                }
            ]
        }"#;

        let event = extract_event(document).unwrap();
        assert_eq!(event.bucket, "rollcall-uploads");
        assert_eq!(event.key, "videos/clip.mp4");
    }

    #[test]
    fn test_extract_event_takes_first_record() {
        let document = r#"{
            "Records": [
                {"s3": {"bucket": {"name": "first"}, "object": {"key": "a.mp4"}}},
                {"s3": {"bucket": {"name": "second"}, "object": {"key": "b.mp4"}}}
            ]
        }"#;

        let event = extract_event(document).unwrap();
        assert_eq!(event.bucket, "first");
        assert_eq!(event.key, "a.mp4");
    }

    #[test]
    fn test_extract_event_empty_records() {
        let err = extract_event(r#"{"Records": []}"#).unwrap_err();
        assert!(err.to_string().contains("No S3 event data found"));
    }

    #[test]
    fn test_extract_event_missing_records_field() {
        let err = extract_event(r#"{"Service": "Amazon S3", "Event": "s3:TestEvent"}"#).unwrap_err();
        assert!(err.to_string().contains("No S3 event data found"));
    }

    #[test]
    fn test_extract_event_invalid_json() {
        let err = extract_event("{not json").unwrap_err();
        assert!(err.to_string().contains("Failed to parse notification JSON"));
    }

    #[test]
    fn test_upload_event_serializes_flat() {
        let event = UploadEvent {
            bucket: "b".to_string(),
            key: "k".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"bucket":"b","key":"k"}"#);
    }
}
