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

//! SQLite-based lock store.
//!
//! Relational backend for the [`LockStore`](crate::LockStore) trait:
//!
//! - One row per locked path, `path` as primary key
//! - Conditional insert via `INSERT ... ON CONFLICT(path) DO NOTHING`, so the
//!   uniqueness check and the write are one statement
//! - Keyset pagination ordered by `path`, token `{"path": <last path>}`

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, instrument};

use crate::filter::{Comparison, LockField};
use crate::store::{path_from_token, path_token};
use crate::{InsertOutcome, Lock, LockError, LockResult, LockStore, ScanPage, ScanRequest};

/// SQLite-based lock store.
///
/// This backend uses a single `lfs_locks` table with the following schema:
///
/// ```sql
/// CREATE TABLE IF NOT EXISTS lfs_locks (
///   path TEXT PRIMARY KEY,
///   owner_identity TEXT NOT NULL,
///   "ref" TEXT NOT NULL DEFAULT '',
///   created_at TEXT NOT NULL
/// );
/// ```
#[derive(Clone)]
pub struct SqliteLockStore {
    pool: SqlitePool,
}

impl SqliteLockStore {
    /// Create a new SQLite lock store.
    ///
    /// `database_url` is any valid `sqlx` SQLite URL, e.g.:
    /// - `sqlite::memory:` (in-memory, single connection)
    /// - `sqlite://locks.db`
    #[instrument(skip(database_url))]
    pub async fn new(database_url: &str) -> LockResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| LockError::ConfigError(format!("invalid SQLite url: {e}")))?
            .create_if_missing(true);

        // every connection to an in-memory database sees its own empty database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| LockError::StoreUnavailable(format!("failed to connect SQLite: {e}")))?;

        Self::with_pool(pool).await
    }

    /// Wrap an existing pool, creating the schema if needed.
    pub async fn with_pool(pool: SqlitePool) -> LockResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lfs_locks (
              path TEXT PRIMARY KEY,
              owner_identity TEXT NOT NULL,
              "ref" TEXT NOT NULL DEFAULT '',
              created_at TEXT NOT NULL
            );
        "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| LockError::StoreUnavailable(format!("failed to create lfs_locks table: {e}")))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_lfs_locks_owner
            ON lfs_locks(owner_identity, path);
        "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| LockError::StoreUnavailable(format!("failed to create index: {e}")))?;

        Ok(Self { pool })
    }

    fn column(field: LockField) -> &'static str {
        match field {
            LockField::Path => "path",
            LockField::OwnerIdentity => "owner_identity",
            LockField::Ref => "\"ref\"",
        }
    }

    fn lock_from_row(row: &SqliteRow) -> LockResult<Lock> {
        let get = |column: &str| -> LockResult<String> {
            row.try_get::<String, _>(column)
                .map_err(|e| LockError::CorruptRecord(format!("column {column}: {e}")))
        };
        Ok(Lock {
            path: get("path")?,
            owner_identity: get("owner_identity")?,
            ref_name: get("ref")?,
            created_at: get("created_at")?,
        })
    }
}

#[async_trait]
impl LockStore for SqliteLockStore {
    #[instrument(skip(self, lock), fields(path = %lock.path, owner = %lock.owner_identity))]
    async fn try_insert(&self, lock: Lock) -> LockResult<InsertOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LockError::StoreUnavailable(format!("begin tx: {e}")))?;

        let result = sqlx::query(
            r#"INSERT INTO lfs_locks (path, owner_identity, "ref", created_at)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(path) DO NOTHING"#,
        )
        .bind(&lock.path)
        .bind(&lock.owner_identity)
        .bind(&lock.ref_name)
        .bind(&lock.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| LockError::StoreUnavailable(format!("insert lock: {e}")))?;

        let outcome = if result.rows_affected() == 1 {
            InsertOutcome { inserted: true, lock }
        } else {
            let row = sqlx::query(
                r#"SELECT path, owner_identity, "ref", created_at
                   FROM lfs_locks WHERE path = ?1"#,
            )
            .bind(&lock.path)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| LockError::StoreUnavailable(format!("select existing lock: {e}")))?;
            debug!("path already locked");
            InsertOutcome {
                inserted: false,
                lock: Self::lock_from_row(&row)?,
            }
        };

        tx.commit()
            .await
            .map_err(|e| LockError::StoreUnavailable(format!("commit tx: {e}")))?;

        Ok(outcome)
    }

    #[instrument(skip(self, request), fields(limit = request.limit, clauses = request.predicate.clauses().len()))]
    async fn scan(&self, request: ScanRequest) -> LockResult<ScanPage> {
        request.validate()?;

        let mut sql = String::from(
            r#"SELECT path, owner_identity, "ref", created_at FROM lfs_locks WHERE 1 = 1"#,
        );
        let mut binds: Vec<String> = Vec::new();

        if let Some(token) = &request.start {
            sql.push_str(" AND path > ?");
            binds.push(path_from_token(token)?);
        }

        for clause in request.predicate.clauses() {
            let op = match clause.comparison {
                Comparison::Equal => "=",
                Comparison::NotEqual => "<>",
            };
            sql.push_str(&format!(" AND {} {} ?", Self::column(clause.field), op));
            binds.push(clause.value.clone());
        }

        sql.push_str(" ORDER BY path LIMIT ?");

        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        // one extra row tells us whether another page exists
        let rows = query
            .bind(i64::from(request.limit) + 1)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LockError::StoreUnavailable(format!("scan locks: {e}")))?;

        let has_more = rows.len() > request.limit as usize;
        let mut records = rows
            .iter()
            .map(Self::lock_from_row)
            .collect::<LockResult<Vec<_>>>()?;
        records.truncate(request.limit as usize);

        let next_token = if has_more {
            records.last().map(|last| path_token(&last.path))
        } else {
            None
        };

        Ok(ScanPage { records, next_token })
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
