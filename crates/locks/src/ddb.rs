// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of lfs-locks.
//
// lfs-locks is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// lfs-locks is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with lfs-locks. If not, see <https://www.gnu.org/licenses/>.

//! DynamoDB-based lock store.
//!
//! ## Design
//! - **Partition Key**: `path` (the lock id)
//! - **Conditional put**: `attribute_not_exists(#path)` with
//!   `ReturnValuesOnConditionCheckFailure=ALL_OLD`, so a conflicting record
//!   comes back from the same atomic call that rejected the write
//! - **Filtered scan**: predicate clauses become a `FilterExpression`; the
//!   `LastEvaluatedKey` is carried in DynamoDB JSON form inside the cursor
//! - **Auto-table creation**: creates the table (on-demand billing) on init
//!
//! ## Table Schema
//! ```text
//! Partition Key: path = "<repository path>"
//! Attributes:
//!   - owner_identity: String (holder's identity id)
//!   - ref: String (may be empty)
//!   - created_at: String (ISO-8601)
//! ```
//!
//! ## Pagination
//! DynamoDB applies `Limit` before the filter. The store keeps scanning with
//! `Limit` shrunk to the capacity still free on the page, so a page never
//! overruns and no matching item is skipped. A token may still be returned
//! when no further item matches; the following page is then empty and final.

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::{DisplayErrorContext, ProvideErrorMetadata},
    operation::put_item::PutItemError,
    primitives::Blob,
    types::{
        AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
        ReturnValuesOnConditionCheckFailure, ScalarAttributeType, TableStatus,
    },
    Client as DynamoDbClient,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use lfs_locks_common::DynamoDBConfig;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::filter::{Comparison, LockField};
use crate::{ContinuationToken, InsertOutcome, Lock, LockError, LockResult, LockStore, ScanPage, ScanRequest};

/// DynamoDB lock store.
///
/// ## Example
/// ```rust,no_run
/// use lfs_locks::{ddb::DynamoDBLockStore, Lock, LockStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = DynamoDBLockStore::new(
///     "us-east-1".to_string(),
///     "lfs-locks".to_string(),
///     Some("http://localhost:8000".to_string()), // For local testing
/// ).await?;
///
/// let outcome = store.try_insert(Lock::new("assets/a.psd", "user-1", "")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DynamoDBLockStore {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoDBLockStore {
    /// Create a new DynamoDB lock store, creating the table if it is missing.
    ///
    /// ## Arguments
    /// * `region` - AWS region (e.g., "us-east-1")
    /// * `table_name` - DynamoDB table name
    /// * `endpoint_url` - Optional endpoint URL (for DynamoDB Local testing)
    #[instrument(skip(region, table_name, endpoint_url), fields(region = %region, table_name = %table_name))]
    pub async fn new(region: String, table_name: String, endpoint_url: Option<String>) -> LockResult<Self> {
        Self::from_config(&DynamoDBConfig {
            region,
            table_name,
            endpoint_url,
        })
        .await
    }

    /// Create a store from [`DynamoDBConfig`].
    pub async fn from_config(config: &DynamoDBConfig) -> LockResult<Self> {
        let start_time = std::time::Instant::now();

        let sdk_config = config.load_sdk_config().await;
        let client = DynamoDbClient::new(&sdk_config);

        Self::ensure_table_exists(&client, &config.table_name).await?;

        let duration = start_time.elapsed();
        metrics::histogram!(
            "lfs_locks_ddb_init_duration_seconds",
            "backend" => "dynamodb"
        )
        .record(duration.as_secs_f64());

        debug!(
            table_name = %config.table_name,
            region = %config.region,
            duration_ms = duration.as_millis(),
            "DynamoDB lock store initialized"
        );

        Ok(Self::with_client(client, config.table_name.clone()))
    }

    /// Wrap an existing client without touching the table.
    pub fn with_client(client: DynamoDbClient, table_name: String) -> Self {
        Self { client, table_name }
    }

    /// Ensure table exists, create if it doesn't.
    #[instrument(skip(client), fields(table_name = %table_name))]
    async fn ensure_table_exists(client: &DynamoDbClient, table_name: &str) -> LockResult<()> {
        match client.describe_table().table_name(table_name).send().await {
            Ok(_) => {
                debug!(table_name = %table_name, "DynamoDB table already exists");
                return Ok(());
            }
            Err(e) => {
                let error_code = e.code().unwrap_or("unknown").to_string();
                if error_code != "ResourceNotFoundException" {
                    error!(
                        table_name = %table_name,
                        error_code = %error_code,
                        error = %DisplayErrorContext(&e),
                        "DynamoDB describe_table failed with unexpected error"
                    );
                    return Err(LockError::StoreUnavailable(format!(
                        "Failed to check table existence: {} (code: {})",
                        DisplayErrorContext(&e),
                        error_code
                    )));
                }
            }
        }

        debug!(table_name = %table_name, "Creating DynamoDB table");

        let key_schema = KeySchemaElement::builder()
            .attribute_name("path")
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| LockError::ConfigError(format!("Failed to build key schema: {}", e)))?;

        let path_attr = AttributeDefinition::builder()
            .attribute_name("path")
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| LockError::ConfigError(format!("Failed to build attribute definition: {}", e)))?;

        let create_table_result = client
            .create_table()
            .table_name(table_name)
            .billing_mode(BillingMode::PayPerRequest)
            .key_schema(key_schema)
            .attribute_definitions(path_attr)
            .send()
            .await;

        match create_table_result {
            Ok(_) => {
                debug!(table_name = %table_name, "DynamoDB table created successfully");
                Self::wait_for_table_active(client, table_name).await
            }
            Err(e) if e.code() == Some("ResourceInUseException") => {
                debug!(table_name = %table_name, "Table created concurrently, waiting for active");
                Self::wait_for_table_active(client, table_name).await
            }
            Err(e) => Err(LockError::StoreUnavailable(format!(
                "Failed to create DynamoDB table: {}",
                DisplayErrorContext(&e)
            ))),
        }
    }

    /// Wait for table to become active.
    #[instrument(skip(client), fields(table_name = %table_name))]
    async fn wait_for_table_active(client: &DynamoDbClient, table_name: &str) -> LockResult<()> {
        let max_attempts = 30;

        for _ in 0..max_attempts {
            let describe_result = client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| {
                    LockError::StoreUnavailable(format!("Failed to describe table: {}", DisplayErrorContext(&e)))
                })?;

            match describe_result.table().and_then(|t| t.table_status()) {
                Some(TableStatus::Active) => {
                    debug!(table_name = %table_name, "Table is now active");
                    return Ok(());
                }
                Some(TableStatus::Creating) | None => {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Some(status) => {
                    return Err(LockError::StoreUnavailable(format!(
                        "Table in unexpected status: {:?}",
                        status
                    )));
                }
            }
        }

        Err(LockError::StoreUnavailable(format!(
            "Table creation timeout after {} attempts",
            max_attempts
        )))
    }

    fn attribute_name(field: LockField) -> &'static str {
        match field {
            LockField::Path => "path",
            LockField::OwnerIdentity => "owner_identity",
            LockField::Ref => "ref",
        }
    }

    /// Convert DynamoDB item to Lock.
    fn item_to_lock(item: &HashMap<String, AttributeValue>) -> LockResult<Lock> {
        let required = |name: &str| -> LockResult<String> {
            item.get(name)
                .and_then(|v| v.as_s().ok())
                .cloned()
                .ok_or_else(|| LockError::CorruptRecord(format!("Missing {} attribute", name)))
        };

        Ok(Lock {
            path: required("path")?,
            owner_identity: required("owner_identity")?,
            ref_name: item
                .get("ref")
                .and_then(|v| v.as_s().ok())
                .cloned()
                .unwrap_or_default(),
            created_at: required("created_at")?,
        })
    }

    /// Convert Lock to DynamoDB item.
    fn lock_to_item(lock: &Lock) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("path".to_string(), AttributeValue::S(lock.path.clone()));
        item.insert("owner_identity".to_string(), AttributeValue::S(lock.owner_identity.clone()));
        item.insert("ref".to_string(), AttributeValue::S(lock.ref_name.clone()));
        item.insert("created_at".to_string(), AttributeValue::S(lock.created_at.clone()));
        item
    }

    /// Read a record with strong consistency.
    async fn get_lock(&self, path: &str) -> LockResult<Option<Lock>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("path", AttributeValue::S(path.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| LockError::StoreUnavailable(format!("DynamoDB get_item failed: {}", DisplayErrorContext(&e))))?;

        output.item.as_ref().map(Self::item_to_lock).transpose()
    }
}

/// `FilterExpression` plus its placeholder maps.
#[derive(Debug, Default, PartialEq)]
struct FilterParts {
    expression: Option<String>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

fn filter_parts(request: &ScanRequest) -> FilterParts {
    let mut parts = FilterParts::default();
    let mut terms = Vec::new();

    for (i, clause) in request.predicate.clauses().iter().enumerate() {
        let attribute = DynamoDBLockStore::attribute_name(clause.field);
        let name = format!("#{}", attribute);
        let value = format!(":v{}", i);
        let op = match clause.comparison {
            Comparison::Equal => "=",
            Comparison::NotEqual => "<>",
        };
        terms.push(format!("{} {} {}", name, op, value));
        parts.names.insert(name, attribute.to_string());
        parts.values.insert(value, AttributeValue::S(clause.value.clone()));
    }

    if !terms.is_empty() {
        parts.expression = Some(terms.join(" AND "));
    }
    parts
}

/// `LastEvaluatedKey` to cursor JSON (DynamoDB JSON notation).
fn key_to_token(key: &HashMap<String, AttributeValue>) -> LockResult<ContinuationToken> {
    let mut map = Map::new();
    for (name, value) in key {
        let encoded = match value {
            AttributeValue::S(s) => json!({ "S": s }),
            AttributeValue::N(n) => json!({ "N": n }),
            AttributeValue::B(b) => json!({ "B": STANDARD.encode(b.as_ref()) }),
            other => {
                return Err(LockError::CorruptRecord(format!(
                    "unsupported key attribute type for {}: {:?}",
                    name, other
                )))
            }
        };
        map.insert(name.clone(), encoded);
    }
    Ok(ContinuationToken::new(Value::Object(map)))
}

/// Cursor JSON back to an `ExclusiveStartKey`.
fn token_to_key(token: &ContinuationToken) -> LockResult<HashMap<String, AttributeValue>> {
    let malformed = || LockError::MalformedCursor("cursor was not issued by this lock store".to_string());

    let object = token.as_value().as_object().ok_or_else(malformed)?;
    if object.is_empty() {
        return Err(malformed());
    }

    let mut key = HashMap::new();
    for (name, typed) in object {
        let typed = typed.as_object().filter(|t| t.len() == 1).ok_or_else(malformed)?;
        let value = match typed.iter().next() {
            Some((kind, Value::String(s))) if kind == "S" => AttributeValue::S(s.clone()),
            Some((kind, Value::String(n))) if kind == "N" => AttributeValue::N(n.clone()),
            Some((kind, Value::String(b))) if kind == "B" => {
                AttributeValue::B(Blob::new(STANDARD.decode(b).map_err(|_| malformed())?))
            }
            _ => return Err(malformed()),
        };
        key.insert(name.clone(), value);
    }
    Ok(key)
}

#[async_trait]
impl LockStore for DynamoDBLockStore {
    #[instrument(skip(self, lock), fields(path = %lock.path, owner = %lock.owner_identity))]
    async fn try_insert(&self, lock: Lock) -> LockResult<InsertOutcome> {
        let start_time = std::time::Instant::now();

        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::lock_to_item(&lock)))
            .condition_expression("attribute_not_exists(#path)")
            .expression_attribute_names("#path", "path")
            .return_values_on_condition_check_failure(ReturnValuesOnConditionCheckFailure::AllOld)
            .send()
            .await;

        let outcome = match result {
            Ok(_) => InsertOutcome { inserted: true, lock },
            Err(e) => {
                let context = DisplayErrorContext(&e).to_string();
                match e.into_service_error() {
                    PutItemError::ConditionalCheckFailedException(conflict) => {
                        let existing = match conflict.item() {
                            Some(item) => Self::item_to_lock(item)?,
                            // older DynamoDB Local builds omit ALL_OLD on conflict
                            None => self.get_lock(&lock.path).await?.ok_or_else(|| {
                                LockError::StoreUnavailable(format!(
                                    "conditional insert for {} failed but no record exists",
                                    lock.path
                                ))
                            })?,
                        };
                        InsertOutcome {
                            inserted: false,
                            lock: existing,
                        }
                    }
                    _ => {
                        error!(error = %context, path = %lock.path, "Failed to put lock in DynamoDB");
                        metrics::counter!(
                            "lfs_locks_ddb_try_insert_errors_total",
                            "backend" => "dynamodb",
                            "error_type" => "put_item_failed"
                        )
                        .increment(1);
                        return Err(LockError::StoreUnavailable(format!("DynamoDB put_item failed: {}", context)));
                    }
                }
            }
        };

        let duration = start_time.elapsed();
        metrics::histogram!(
            "lfs_locks_ddb_try_insert_duration_seconds",
            "backend" => "dynamodb"
        )
        .record(duration.as_secs_f64());
        metrics::counter!(
            "lfs_locks_ddb_try_insert_total",
            "backend" => "dynamodb",
            "result" => if outcome.inserted { "inserted" } else { "conflict" }
        )
        .increment(1);

        debug!(
            inserted = outcome.inserted,
            holder = %outcome.lock.owner_identity,
            duration_ms = duration.as_millis(),
            "Conditional insert finished"
        );

        Ok(outcome)
    }

    #[instrument(skip(self, request), fields(limit = request.limit, clauses = request.predicate.clauses().len()))]
    async fn scan(&self, request: ScanRequest) -> LockResult<ScanPage> {
        request.validate()?;
        let start_time = std::time::Instant::now();

        let limit = request.limit as usize;
        let filter = filter_parts(&request);
        let mut exclusive_start_key = request.start.as_ref().map(token_to_key).transpose()?;
        let mut records = Vec::with_capacity(limit);
        let mut round_trips = 0u32;

        loop {
            let remaining = limit - records.len();
            let mut scan = self
                .client
                .scan()
                .table_name(&self.table_name)
                .limit(i32::try_from(remaining).unwrap_or(i32::MAX))
                .set_exclusive_start_key(exclusive_start_key.take());

            if let Some(expression) = &filter.expression {
                scan = scan
                    .filter_expression(expression)
                    .set_expression_attribute_names(Some(filter.names.clone()))
                    .set_expression_attribute_values(Some(filter.values.clone()));
            }

            let output = scan.send().await.map_err(|e| {
                error!(error = %DisplayErrorContext(&e), "DynamoDB scan failed");
                metrics::counter!(
                    "lfs_locks_ddb_scan_errors_total",
                    "backend" => "dynamodb"
                )
                .increment(1);
                LockError::StoreUnavailable(format!("DynamoDB scan failed: {}", DisplayErrorContext(&e)))
            })?;
            round_trips += 1;

            for item in output.items.unwrap_or_default() {
                records.push(Self::item_to_lock(&item)?);
            }

            exclusive_start_key = output.last_evaluated_key;
            if exclusive_start_key.is_none() || records.len() >= limit {
                break;
            }
        }

        let next_token = exclusive_start_key.as_ref().map(key_to_token).transpose()?;

        let duration = start_time.elapsed();
        metrics::histogram!(
            "lfs_locks_ddb_scan_duration_seconds",
            "backend" => "dynamodb"
        )
        .record(duration.as_secs_f64());

        debug!(
            returned = records.len(),
            round_trips,
            more = next_token.is_some(),
            duration_ms = duration.as_millis(),
            "DynamoDB scan finished"
        );

        Ok(ScanPage { records, next_token })
    }

    fn backend_name(&self) -> &'static str {
        "dynamodb"
    }
}
