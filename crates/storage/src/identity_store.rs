//! DynamoDB-backed identity lookup
//!
//! Matches the table layout of the enrolled-student data: one item per row
//! with string attributes `name`, `major`, `year`. Lookup is an equality
//! filter scan on `name`, not an indexed query.

use crate::{StorageError, StorageResult};
use aws_sdk_dynamodb::{
    config::{Credentials, Region},
    types::AttributeValue,
    Client,
};
use rollcall_common::IdentityRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// DynamoDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamoConfig {
    /// Table holding the identity rows
    pub table: String,

    /// AWS region
    pub region: String,

    /// Custom endpoint (for DynamoDB Local), empty for AWS
    pub endpoint: Option<String>,

    /// AWS access key ID
    pub access_key_id: String,

    /// AWS secret access key
    pub secret_access_key: String,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            table: std::env::var("ROLLCALL_TABLE").unwrap_or_else(|_| "student_data".to_string()),
            region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint: None,
            access_key_id: std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
        }
    }
}

/// Identity lookup trait
#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    /// All rows whose `name` attribute equals the given name
    async fn find_by_name(&self, name: &str) -> StorageResult<Vec<IdentityRecord>>;
}

/// DynamoDB identity store implementation
pub struct DynamoDbIdentityStore {
    client: Client,
    table: String,
}

impl DynamoDbIdentityStore {
    /// Create a new DynamoDB identity store client
    pub async fn new(config: DynamoConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "rollcall-storage",
        );

        let region = Region::new(config.region.clone());

        let mut db_config_builder = aws_sdk_dynamodb::Config::builder()
            .credentials_provider(credentials)
            .region(region)
            .behavior_version_latest();

        if let Some(endpoint) = config.endpoint {
            db_config_builder = db_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(db_config_builder.build());

        Ok(Self {
            client,
            table: config.table,
        })
    }
}

#[async_trait::async_trait]
impl IdentityStore for DynamoDbIdentityStore {
    async fn find_by_name(&self, name: &str) -> StorageResult<Vec<IdentityRecord>> {
        // `name` is a reserved word in DynamoDB expressions, hence the alias
        let response = self
            .client
            .scan()
            .table_name(&self.table)
            .filter_expression("#n = :name")
            .expression_attribute_names("#n", "name")
            .expression_attribute_values(":name", AttributeValue::S(name.to_string()))
            .send()
            .await
            .map_err(|e| StorageError::DynamoError(e.to_string()))?;

        // First page only; the table is expected to stay small
        response.items().iter().map(item_to_record).collect()
    }
}

fn item_to_record(item: &HashMap<String, AttributeValue>) -> StorageResult<IdentityRecord> {
    Ok(IdentityRecord {
        name: string_attr(item, "name")?,
        major: string_attr(item, "major")?,
        year: string_attr(item, "year")?,
    })
}

fn string_attr(item: &HashMap<String, AttributeValue>, field: &str) -> StorageResult<String> {
    item.get(field)
        .and_then(|value| value.as_s().ok())
        .cloned()
        .ok_or_else(|| StorageError::MalformedItem(format!("missing string attribute `{field}`")))
}
