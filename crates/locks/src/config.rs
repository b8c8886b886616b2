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

//! Lock service configuration.
//!
//! ## Environment Variables
//!
//! ### Backend Selection
//! - `LFS_LOCKS_BACKEND`: Backend type (`memory`, `sqlite`, `dynamodb`). Default: `memory`
//!
//! ### SQLite
//! - `LFS_LOCKS_SQLITE_URL`: Database URL (default: `sqlite::memory:`)
//!
//! ### DynamoDB
//! - `AWS_REGION` / `LFS_LOCKS_AWS_REGION`, `LFS_LOCKS_DDB_TABLE`,
//!   `DYNAMODB_ENDPOINT_URL` / `LFS_LOCKS_DDB_ENDPOINT_URL`
//!
//! ### Pagination
//! - `LFS_LOCKS_PAGINATION_MIN`: Smallest page a client may request (default: 1)
//! - `LFS_LOCKS_PAGINATION_MAX`: Largest page, also used when no limit is sent (default: 100)
//!
//! ## Examples
//!
//! ```bash
//! export LFS_LOCKS_BACKEND=dynamodb
//! export LFS_LOCKS_DDB_TABLE=lfs-locks-prod
//! export LFS_LOCKS_PAGINATION_MAX=50
//! cargo run -p lfs-locks-server
//! ```

use lfs_locks_common::DynamoDBConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{LockError, LockResult, LockStore, MemoryLockStore};

pub const DEFAULT_PAGINATION_MIN: u32 = 1;
pub const DEFAULT_PAGINATION_MAX: u32 = 100;
pub const DEFAULT_SQLITE_URL: &str = "sqlite::memory:";

/// Page-size bounds applied to client supplied limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    pub min: u32,
    pub max: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            min: DEFAULT_PAGINATION_MIN,
            max: DEFAULT_PAGINATION_MAX,
        }
    }
}

impl PaginationConfig {
    pub fn new(min: u32, max: u32) -> LockResult<Self> {
        let config = Self { min, max };
        config.validate()?;
        Ok(config)
    }

    /// Clamp a requested limit into `[min, max]`; no limit means `max`.
    pub fn clamp(&self, requested: Option<i64>) -> u32 {
        self.clamp_with_floor(requested, self.min)
    }

    /// Like [`clamp`](Self::clamp) but never below `floor`.
    pub fn clamp_with_floor(&self, requested: Option<i64>, floor: u32) -> u32 {
        let lower = i64::from(self.min.max(floor).min(self.max));
        let upper = i64::from(self.max);
        let clamped = requested.unwrap_or(upper).max(lower).min(upper);
        // bounded by max, which is a u32
        u32::try_from(clamped).unwrap_or(self.max)
    }

    pub fn validate(&self) -> LockResult<()> {
        if self.min < 1 {
            return Err(LockError::ConfigError("pagination min must be at least 1".to_string()));
        }
        if self.min > self.max {
            return Err(LockError::ConfigError(format!(
                "pagination min ({}) exceeds max ({})",
                self.min, self.max
            )));
        }
        if self.max < 2 {
            return Err(LockError::ConfigError(
                "pagination max must be at least 2 so verify pages can be split".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_lookup<F>(lookup: F) -> LockResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |name: &str, default: u32| -> LockResult<u32> {
            match lookup(name) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| LockError::ConfigError(format!("{} must be a positive integer, got {:?}", name, raw))),
                None => Ok(default),
            }
        };

        let config = Self {
            min: parse("LFS_LOCKS_PAGINATION_MIN", DEFAULT_PAGINATION_MIN)?,
            max: parse("LFS_LOCKS_PAGINATION_MAX", DEFAULT_PAGINATION_MAX)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> LockResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// Backend type configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackendType {
    /// In-memory map (default, always available)
    #[default]
    InMemory,
    /// SQLite backend (requires sqlite-backend feature)
    Sqlite {
        /// sqlx connection URL
        url: String,
    },
    /// DynamoDB backend (requires ddb-backend feature)
    DynamoDB(DynamoDBConfig),
}

/// Lock service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocksConfig {
    pub backend: BackendType,
    pub pagination: PaginationConfig,
}

impl LocksConfig {
    pub fn new(backend: BackendType, pagination: PaginationConfig) -> Self {
        Self { backend, pagination }
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> LockResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_str = lookup("LFS_LOCKS_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .to_lowercase();

        let backend = match backend_str.as_str() {
            "memory" | "in-memory" => BackendType::InMemory,
            "sqlite" => BackendType::Sqlite {
                url: lookup("LFS_LOCKS_SQLITE_URL").unwrap_or_else(|| DEFAULT_SQLITE_URL.to_string()),
            },
            "dynamodb" | "ddb" => BackendType::DynamoDB(DynamoDBConfig::from_lookup(&lookup)),
            other => {
                return Err(LockError::ConfigError(format!(
                    "Unknown backend type: {}. Valid options: memory, sqlite, dynamodb",
                    other
                )))
            }
        };

        Ok(Self {
            backend,
            pagination: PaginationConfig::from_lookup(&lookup)?,
        })
    }

    /// Create configuration from environment variables.
    pub fn from_env() -> LockResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

/// Create a lock store for the configured backend.
pub async fn create_lock_store_from_config(backend: &BackendType) -> LockResult<Arc<dyn LockStore>> {
    match backend {
        BackendType::InMemory => Ok(Arc::new(MemoryLockStore::new())),

        #[cfg(feature = "sqlite-backend")]
        BackendType::Sqlite { url } => {
            let store = crate::sql::SqliteLockStore::new(url).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "sqlite-backend"))]
        BackendType::Sqlite { .. } => Err(LockError::ConfigError(
            "SQLite backend requires 'sqlite-backend' feature".to_string(),
        )),

        #[cfg(feature = "ddb-backend")]
        BackendType::DynamoDB(config) => {
            let store = crate::ddb::DynamoDBLockStore::from_config(config).await?;
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "ddb-backend"))]
        BackendType::DynamoDB(_) => Err(LockError::ConfigError(
            "DynamoDB backend requires 'ddb-backend' feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_clamp() {
        let pagination = PaginationConfig::new(1, 100).unwrap();
        assert_eq!(pagination.clamp(None), 100);
        assert_eq!(pagination.clamp(Some(0)), 1);
        assert_eq!(pagination.clamp(Some(-5)), 1);
        assert_eq!(pagination.clamp(Some(37)), 37);
        assert_eq!(pagination.clamp(Some(10_000)), 100);
        assert_eq!(pagination.clamp(Some(i64::MAX)), 100);
    }

    #[test]
    fn test_clamp_with_floor() {
        let pagination = PaginationConfig::new(1, 100).unwrap();
        assert_eq!(pagination.clamp_with_floor(Some(1), 2), 2);
        assert_eq!(pagination.clamp_with_floor(Some(-1), 2), 2);
        assert_eq!(pagination.clamp_with_floor(Some(7), 2), 7);
        assert_eq!(pagination.clamp_with_floor(None, 2), 100);
    }

    #[test]
    fn test_validate() {
        assert!(PaginationConfig::new(0, 10).is_err());
        assert!(PaginationConfig::new(5, 4).is_err());
        assert!(PaginationConfig::new(1, 1).is_err());
        assert!(PaginationConfig::new(2, 2).is_ok());
    }

    #[test]
    fn test_default_config() {
        let config = LocksConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, LocksConfig::default());
        assert_eq!(config.pagination.max, DEFAULT_PAGINATION_MAX);
    }

    #[test]
    fn test_sqlite_config() {
        let config = LocksConfig::from_lookup(lookup_from(&[
            ("LFS_LOCKS_BACKEND", "SQLite"),
            ("LFS_LOCKS_SQLITE_URL", "sqlite:///tmp/locks.db"),
            ("LFS_LOCKS_PAGINATION_MAX", "25"),
        ]))
        .unwrap();
        assert_eq!(
            config.backend,
            BackendType::Sqlite {
                url: "sqlite:///tmp/locks.db".to_string()
            }
        );
        assert_eq!(config.pagination, PaginationConfig { min: 1, max: 25 });
    }

    #[test]
    fn test_dynamodb_config() {
        let config = LocksConfig::from_lookup(lookup_from(&[
            ("LFS_LOCKS_BACKEND", "dynamodb"),
            ("LFS_LOCKS_DDB_TABLE", "locks-test"),
        ]))
        .unwrap();
        match config.backend {
            BackendType::DynamoDB(ddb) => assert_eq!(ddb.table_name, "locks-test"),
            other => panic!("expected DynamoDB backend, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            LocksConfig::from_lookup(lookup_from(&[("LFS_LOCKS_BACKEND", "etcd")])),
            Err(LockError::ConfigError(_))
        ));
        assert!(matches!(
            LocksConfig::from_lookup(lookup_from(&[("LFS_LOCKS_PAGINATION_MAX", "lots")])),
            Err(LockError::ConfigError(_))
        ));
        assert!(matches!(
            LocksConfig::from_lookup(lookup_from(&[("LFS_LOCKS_PAGINATION_MIN", "50"), ("LFS_LOCKS_PAGINATION_MAX", "10")])),
            Err(LockError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        let store = create_lock_store_from_config(&BackendType::InMemory).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[cfg(not(feature = "sqlite-backend"))]
    #[tokio::test]
    async fn test_sqlite_requires_feature() {
        let backend = BackendType::Sqlite {
            url: DEFAULT_SQLITE_URL.to_string(),
        };
        assert!(matches!(
            create_lock_store_from_config(&backend).await,
            Err(LockError::ConfigError(_))
        ));
    }
}
