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

//! AWS configuration helpers.
//!
//! ## Purpose
//! Loads the DynamoDB settings used by the lock table from environment
//! variables with defaults.
//!
//! ## Configuration Precedence
//! 1. Environment variables (highest priority)
//! 2. Defaults (lowest priority)
//!
//! ## Environment Variables
//! - `AWS_REGION` / `LFS_LOCKS_AWS_REGION` - AWS region (e.g., "us-east-1")
//! - `LFS_LOCKS_DDB_TABLE` - Lock table name (default: "lfs-locks")
//! - `DYNAMODB_ENDPOINT_URL` / `LFS_LOCKS_DDB_ENDPOINT_URL` - DynamoDB endpoint URL (for local testing)
//!
//! Credentials are picked up by the AWS SDK itself (`AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`, profiles, instance roles).

use serde::{Deserialize, Serialize};
use std::env;

/// Default lock table name.
pub const DEFAULT_LOCK_TABLE: &str = "lfs-locks";

/// DynamoDB configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamoDBConfig {
    /// AWS region
    pub region: String,
    /// Lock table name
    pub table_name: String,
    /// Endpoint URL (for local testing)
    pub endpoint_url: Option<String>,
}

impl Default for DynamoDBConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            table_name: DEFAULT_LOCK_TABLE.to_string(),
            endpoint_url: None,
        }
    }
}

impl DynamoDBConfig {
    /// Load DynamoDB configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load DynamoDB configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let region = lookup("AWS_REGION")
            .or_else(|| lookup("LFS_LOCKS_AWS_REGION"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "us-east-1".to_string());

        let table_name = lookup("LFS_LOCKS_DDB_TABLE")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCK_TABLE.to_string());

        let endpoint_url = lookup("DYNAMODB_ENDPOINT_URL")
            .or_else(|| lookup("LFS_LOCKS_DDB_ENDPOINT_URL"))
            .filter(|s| !s.is_empty());

        Self {
            region,
            table_name,
            endpoint_url,
        }
    }

    /// Build the AWS SDK configuration for this table's region and endpoint.
    pub async fn load_sdk_config(&self) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(self.region.clone()));

        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }

        loader.load().await
    }
}
