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

//! Lock store trait.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{ContinuationToken, Lock, LockError, LockResult, Predicate};

/// Result of a conditional insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    /// `true` when this call created the record
    pub inserted: bool,
    /// The new record, or the pre-existing one on conflict
    pub lock: Lock,
}

/// One bounded, predicate-filtered page request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub predicate: Predicate,
    pub limit: u32,
    pub start: Option<ContinuationToken>,
}

impl ScanRequest {
    pub fn new(predicate: Predicate, limit: u32) -> Self {
        Self {
            predicate,
            limit,
            start: None,
        }
    }

    pub fn starting_at(mut self, start: Option<ContinuationToken>) -> Self {
        self.start = start;
        self
    }

    pub(crate) fn validate(&self) -> LockResult<()> {
        if self.limit == 0 {
            return Err(LockError::InvalidInput("scan limit must be positive".to_string()));
        }
        Ok(())
    }
}

/// One page of scan results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub records: Vec<Lock>,
    /// Present when the scan stopped before exhausting the table
    pub next_token: Option<ContinuationToken>,
}

/// Key-addressed lock record store.
///
/// ## Contract
/// - `try_insert` is a single atomic conditional write at the store: it
///   creates the record iff no record exists for `lock.path`, otherwise it
///   returns the existing record untouched.
/// - `scan` returns at most `limit` matching records. Ordering is
///   store-defined but stable across successive tokens for a fixed
///   predicate and limit, so a static table is visited exactly once.
/// - A token the store did not issue fails with `MalformedCursor`.
/// - Transport failures surface as `StoreUnavailable` and are not retried.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Insert `lock` unless its path is already locked.
    async fn try_insert(&self, lock: Lock) -> LockResult<InsertOutcome>;

    /// Return one page of records matching the request's predicate.
    async fn scan(&self, request: ScanRequest) -> LockResult<ScanPage>;

    /// Backend label for logs and metrics.
    fn backend_name(&self) -> &'static str;
}

/// Keyset token used by path-ordered backends.
pub(crate) fn path_token(path: &str) -> ContinuationToken {
    ContinuationToken::new(json!({ "path": path }))
}

/// Extract the resume path from a keyset token.
pub(crate) fn path_from_token(token: &ContinuationToken) -> LockResult<String> {
    match token.as_value().get("path") {
        Some(Value::String(path)) => Ok(path.clone()),
        _ => Err(LockError::MalformedCursor(
            "cursor was not issued by this lock store".to_string(),
        )),
    }
}
