//! Storage layer for the rollcall pipeline
//!
//! Three narrow backends, each behind its own interface:
//! - **Object storage (S3/MinIO)**: source videos in, result CSVs out
//! - **Identity table (DynamoDB)**: `name` -> `{name, major, year}` rows
//! - **Encoding file**: a persisted collection of enrolled face encodings
//!
//! # Example
//!
//! ```rust,no_run
//! use rollcall_storage::{ObjectStore, S3Config, S3ObjectStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = S3ObjectStore::new(S3Config::default()).await?;
//!     store
//!         .put_object("results", "clip.csv", b"Alice,CS,2025")
//!         .await?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

pub mod encoding_store;
pub mod identity_store;
pub mod object_store;

pub use encoding_store::EncodingStore;
pub use identity_store::{DynamoConfig, DynamoDbIdentityStore, IdentityStore};
pub use object_store::{ObjectStore, S3Config, S3ObjectStore};

/// Storage layer errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("S3 error: {0}")]
    S3Error(String),

    #[error("DynamoDB error: {0}")]
    DynamoError(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Malformed table item: {0}")]
    MalformedItem(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
