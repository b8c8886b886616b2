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

//! Test helpers for integration tests against local services
//!
//! Provides utilities to check whether DynamoDB Local is reachable before
//! running backend integration tests, so suites skip instead of failing on
//! machines without Docker.

use std::time::Duration;
use tokio::time::timeout;

/// Check if DynamoDB Local is running on the configured endpoint
pub async fn dynamodb_local_available() -> bool {
    check_service_health(&get_dynamodb_endpoint(), Duration::from_secs(2)).await
}

/// Check if a service is reachable by making an HTTP request.
///
/// DynamoDB Local answers a bare GET with 400, so any HTTP response counts.
async fn check_service_health(url: &str, timeout_duration: Duration) -> bool {
    let client = match reqwest::Client::builder()
        .timeout(timeout_duration)
        .build()
    {
        Ok(c) => c,
        Err(_) => return false,
    };

    matches!(timeout(timeout_duration, client.get(url).send()).await, Ok(Ok(_)))
}

/// Get DynamoDB endpoint URL (from env or default)
pub fn get_dynamodb_endpoint() -> String {
    std::env::var("DYNAMODB_ENDPOINT_URL")
        .or_else(|_| std::env::var("LFS_LOCKS_DDB_ENDPOINT_URL"))
        .unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// Setup AWS environment variables for local testing
pub fn setup_aws_local_env() {
    std::env::set_var("AWS_REGION", std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()));
    std::env::set_var("AWS_ACCESS_KEY_ID", std::env::var("AWS_ACCESS_KEY_ID").unwrap_or_else(|_| "test".to_string()));
    std::env::set_var("AWS_SECRET_ACCESS_KEY", std::env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_else(|_| "test".to_string()));

    if std::env::var("DYNAMODB_ENDPOINT_URL").is_err() {
        std::env::set_var("DYNAMODB_ENDPOINT_URL", "http://localhost:8000");
    }
}
