//! Integration tests for the webhook server
//!
//! These tests start the webhook with a recording stub in place of the real
//! pipeline, send requests over HTTP, and verify the acknowledgement
//! contract: every well-formed event is answered 200 "OK" no matter how
//! processing goes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use rollcall_orchestrator::{PipelineReport, UploadHandler};
use rollcall_webhook::{start_server, AckMode, ApiState};

/// Handler that records the uploads it was asked to process
struct RecordingHandler {
    calls: Mutex<Vec<(String, String)>>,
    status: u16,
    delay: Duration,
}

impl RecordingHandler {
    fn with_status(status: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            status,
            delay: Duration::ZERO,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            status: 200,
            delay,
        })
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UploadHandler for RecordingHandler {
    async fn handle_upload(&self, bucket: &str, key: &str) -> PipelineReport {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        self.calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        PipelineReport {
            status: self.status,
            message: "stub".to_string(),
        }
    }
}

#[tokio::test]
async fn test_webhook_acknowledges_and_processes() {
    let handler = RecordingHandler::with_status(200);
    let state = ApiState::new(handler.clone(), AckMode::Blocking);
    let server_handle = tokio::spawn(async move {
        start_server("127.0.0.1:18080", state)
            .await
            .expect("Failed to start server");
    });

    // Give server time to start
    sleep(Duration::from_secs(1)).await;

    let client = reqwest::Client::new();
    let response = client
        .post("http://127.0.0.1:18080/webhook")
        .json(&serde_json::json!({
            "bucket": "rollcall-uploads",
            "key": "videos/clip.mp4"
        }))
        .send()
        .await
        .expect("Failed to send event");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    // Blocking mode: processing finished before the acknowledgement
    assert_eq!(
        handler.calls(),
        vec![(
            "rollcall-uploads".to_string(),
            "videos/clip.mp4".to_string()
        )]
    );

    // Cleanup
    server_handle.abort();
}

#[tokio::test]
async fn test_webhook_acknowledges_processing_failure() {
    let handler = RecordingHandler::with_status(500);
    let state = ApiState::new(handler.clone(), AckMode::Blocking);
    let server_handle = tokio::spawn(async move {
        start_server("127.0.0.1:18081", state)
            .await
            .expect("Failed to start server");
    });

    sleep(Duration::from_secs(1)).await;

    let client = reqwest::Client::new();
    let response = client
        .post("http://127.0.0.1:18081/webhook")
        .json(&serde_json::json!({
            "bucket": "rollcall-uploads",
            "key": "clip.mp4"
        }))
        .send()
        .await
        .expect("Failed to send event");

    // The pipeline failed but the event source still gets 200 "OK"
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
    assert_eq!(handler.calls().len(), 1);

    server_handle.abort();
}

#[tokio::test]
async fn test_webhook_ignores_event_without_key() {
    let handler = RecordingHandler::with_status(200);
    let state = ApiState::new(handler.clone(), AckMode::Blocking);
    let server_handle = tokio::spawn(async move {
        start_server("127.0.0.1:18082", state)
            .await
            .expect("Failed to start server");
    });

    sleep(Duration::from_secs(1)).await;

    let client = reqwest::Client::new();
    let response = client
        .post("http://127.0.0.1:18082/webhook")
        .json(&serde_json::json!({ "bucket": "rollcall-uploads" }))
        .send()
        .await
        .expect("Failed to send event");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    // Nothing to process
    assert!(handler.calls().is_empty());

    server_handle.abort();
}

#[tokio::test]
async fn test_webhook_rejects_invalid_json() {
    let handler = RecordingHandler::with_status(200);
    let state = ApiState::new(handler.clone(), AckMode::Blocking);
    let server_handle = tokio::spawn(async move {
        start_server("127.0.0.1:18083", state)
            .await
            .expect("Failed to start server");
    });

    sleep(Duration::from_secs(1)).await;

    let client = reqwest::Client::new();
    let response = client
        .post("http://127.0.0.1:18083/webhook")
        .header("Content-Type", "application/json")
        .body("{invalid json")
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_client_error());
    assert!(handler.calls().is_empty());

    server_handle.abort();
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = ApiState::new(RecordingHandler::with_status(200), AckMode::Blocking);
    let server_handle = tokio::spawn(async move {
        start_server("127.0.0.1:18084", state)
            .await
            .expect("Failed to start server");
    });

    sleep(Duration::from_secs(1)).await;

    let client = reqwest::Client::new();
    let response = client
        .get("http://127.0.0.1:18084/health")
        .send()
        .await
        .expect("Failed to send health check request");

    assert_eq!(response.status(), 200);

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());

    server_handle.abort();
}

#[tokio::test]
async fn test_deferred_mode_acknowledges_before_processing() {
    let handler = RecordingHandler::slow(Duration::from_secs(1));
    let state = ApiState::new(handler.clone(), AckMode::Deferred);
    let server_handle = tokio::spawn(async move {
        start_server("127.0.0.1:18085", state)
            .await
            .expect("Failed to start server");
    });

    sleep(Duration::from_secs(1)).await;

    let client = reqwest::Client::new();
    let response = client
        .post("http://127.0.0.1:18085/webhook")
        .json(&serde_json::json!({
            "bucket": "rollcall-uploads",
            "key": "clip.mp4"
        }))
        .send()
        .await
        .expect("Failed to send event");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    // The acknowledgement arrived while the handler is still sleeping
    assert!(handler.calls().is_empty());

    // The background task completes on its own
    sleep(Duration::from_secs(2)).await;
    assert_eq!(handler.calls().len(), 1);

    server_handle.abort();
}
