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

//! In-memory lock store implementation.

use async_trait::async_trait;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::store::{path_from_token, path_token};
use crate::{InsertOutcome, Lock, LockResult, LockStore, ScanPage, ScanRequest};

/// In-memory lock store.
///
/// ## Purpose
/// Provides a simple in-memory implementation of `LockStore` for testing
/// and single-process deployments.
///
/// ## Semantics
/// - Conditional insert runs under the write guard, so it is atomic with
///   respect to every other caller of the same store
/// - Records are kept ordered by path; scans resume strictly after the path
///   carried in the token
///
/// ## Limitations
/// - Not persistent (locks lost on restart)
/// - Not distributed (single process only)
#[derive(Clone, Default)]
pub struct MemoryLockStore {
    locks: Arc<RwLock<BTreeMap<String, Lock>>>,
}

impl MemoryLockStore {
    /// Create an empty in-memory lock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `locks` (later duplicates are ignored).
    pub fn with_locks(locks: impl IntoIterator<Item = Lock>) -> Self {
        let mut map = BTreeMap::new();
        for lock in locks {
            map.entry(lock.path.clone()).or_insert(lock);
        }
        Self {
            locks: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    #[instrument(skip(self, lock), fields(path = %lock.path, owner = %lock.owner_identity))]
    async fn try_insert(&self, lock: Lock) -> LockResult<InsertOutcome> {
        let mut locks = self.locks.write().await;
        match locks.entry(lock.path.clone()) {
            Entry::Occupied(existing) => {
                debug!("path already locked");
                Ok(InsertOutcome {
                    inserted: false,
                    lock: existing.get().clone(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(lock.clone());
                Ok(InsertOutcome { inserted: true, lock })
            }
        }
    }

    #[instrument(skip(self, request), fields(limit = request.limit, clauses = request.predicate.clauses().len()))]
    async fn scan(&self, request: ScanRequest) -> LockResult<ScanPage> {
        request.validate()?;

        let lower = match &request.start {
            Some(token) => Bound::Excluded(path_from_token(token)?),
            None => Bound::Unbounded,
        };

        let locks = self.locks.read().await;
        let limit = request.limit as usize;
        let mut matching = locks
            .range::<String, _>((lower, Bound::Unbounded))
            .map(|(_, lock)| lock)
            .filter(|lock| request.predicate.matches(lock));

        let records: Vec<Lock> = matching.by_ref().take(limit).cloned().collect();
        let next_token = match (matching.next(), records.last()) {
            (Some(_), Some(last)) => Some(path_token(&last.path)),
            _ => None,
        };

        Ok(ScanPage { records, next_token })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
