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

//! Lock registry: the operations behind the LFS locks API.
//!
//! The registry is stateless. Exclusivity comes from the store's conditional
//! insert; the registry gates, clamps, paginates and enriches.

use lfs_locks_common::RequestContext;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{
    not_owned_by, owned_by, ContinuationToken, CursorSet, IdentityResolver, Lock, LockError,
    LockFilters, LockResult, LockStore, LockView, PaginationConfig, Predicate, ScanPage,
    ScanRequest,
};

/// Stream of locks held by the requesting principal.
pub const OURS: &str = "ours";
/// Stream of locks held by anyone else.
pub const THEIRS: &str = "theirs";

/// Smallest verify page; each stream gets half of it.
const VERIFY_LIMIT_FLOOR: u32 = 2;

/// Result of [`LockRegistry::try_lock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    /// `false` when the path was already locked; `lock` is then the holder's.
    pub acquired: bool,
    pub lock: LockView,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub filters: LockFilters,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyRequest {
    pub ref_name: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

/// One page of `list_locks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LockPage {
    pub locks: Vec<LockView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// One page of `verify_locks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyResult {
    pub ours: Vec<LockView>,
    pub theirs: Vec<LockView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// A named, independently paginated scan over the lock table.
#[derive(Debug, Clone, PartialEq)]
pub struct PageStream {
    pub name: &'static str,
    pub predicate: Predicate,
    pub start: Option<ContinuationToken>,
}

impl PageStream {
    pub fn new(name: &'static str, predicate: Predicate, start: Option<ContinuationToken>) -> Self {
        Self { name, predicate, start }
    }

    pub async fn fetch(self, store: &dyn LockStore, limit: u32) -> LockResult<ScanPage> {
        store
            .scan(ScanRequest::new(self.predicate, limit).starting_at(self.start))
            .await
    }
}

/// Combine per-stream continuations; exhausted streams are left out.
pub fn merge_continuations<'a, I>(streams: I) -> CursorSet
where
    I: IntoIterator<Item = (&'a str, Option<ContinuationToken>)>,
{
    let mut cursors = CursorSet::new();
    for (name, token) in streams {
        if let Some(token) = token {
            cursors.insert(name, token);
        }
    }
    cursors
}

/// Lock registry.
#[derive(Clone)]
pub struct LockRegistry {
    store: Arc<dyn LockStore>,
    identities: Arc<dyn IdentityResolver>,
    pagination: PaginationConfig,
}

impl LockRegistry {
    pub fn new(
        store: Arc<dyn LockStore>,
        identities: Arc<dyn IdentityResolver>,
        pagination: PaginationConfig,
    ) -> Self {
        Self {
            store,
            identities,
            pagination,
        }
    }

    pub fn pagination(&self) -> PaginationConfig {
        self.pagination
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    fn require_push(&self, ctx: &RequestContext, operation: &'static str) -> LockResult<()> {
        if ctx.access().can_push() {
            return Ok(());
        }
        warn!(
            principal_id = %ctx.principal_id(),
            access = %ctx.access(),
            operation,
            "Rejected lock operation without push access"
        );
        metrics::counter!(
            "lfs_locks_registry_forbidden_total",
            "operation" => operation
        )
        .increment(1);
        Err(LockError::Forbidden)
    }

    /// Attach owner display names to a page with one resolver call.
    async fn resolve_page(&self, ctx: &RequestContext, records: &[Lock]) -> LockResult<Vec<LockView>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: BTreeSet<String> = records.iter().map(|l| l.owner_identity.clone()).collect();
        let identities = self.identities.resolve(ctx, &ids).await?;

        records
            .iter()
            .map(|lock| {
                identities
                    .get(&lock.owner_identity)
                    .map(|identity| lock.to_view(identity.display_name()))
                    .ok_or_else(|| {
                        LockError::IdentityResolution(format!(
                            "no identity returned for {}",
                            lock.owner_identity
                        ))
                    })
            })
            .collect()
    }

    /// Try to lock `path` for the requesting principal.
    ///
    /// Requires push access. On conflict the existing lock is returned with
    /// `acquired == false`.
    #[instrument(skip(self, ctx), fields(principal_id = %ctx.principal_id(), request_id = %ctx.request_id(), backend = self.store.backend_name()))]
    pub async fn try_lock(&self, ctx: &RequestContext, path: &str, ref_name: &str) -> LockResult<Acquisition> {
        self.require_push(ctx, "try_lock")?;
        if path.is_empty() {
            return Err(LockError::InvalidInput("path must not be empty".to_string()));
        }

        let start_time = std::time::Instant::now();
        let outcome = self
            .store
            .try_insert(Lock::new(path, ctx.principal_id(), ref_name))
            .await?;

        let mut views = self.resolve_page(ctx, std::slice::from_ref(&outcome.lock)).await?;
        let lock = views
            .pop()
            .ok_or_else(|| LockError::IdentityResolution("empty identity page".to_string()))?;

        metrics::histogram!(
            "lfs_locks_registry_try_lock_duration_seconds",
            "backend" => self.store.backend_name()
        )
        .record(start_time.elapsed().as_secs_f64());
        metrics::counter!(
            "lfs_locks_registry_try_lock_total",
            "backend" => self.store.backend_name(),
            "result" => if outcome.inserted { "acquired" } else { "conflict" }
        )
        .increment(1);

        if outcome.inserted {
            info!(path = %lock.path, "Lock acquired");
        } else {
            debug!(path = %lock.path, holder = %outcome.lock.owner_identity, "Path already locked");
        }

        Ok(Acquisition {
            acquired: outcome.inserted,
            lock,
        })
    }

    /// List locks matching `request.filters`, one page at a time.
    #[instrument(skip(self, ctx, request), fields(principal_id = %ctx.principal_id(), request_id = %ctx.request_id(), limit = ?request.limit))]
    pub async fn list_locks(&self, ctx: &RequestContext, request: ListRequest) -> LockResult<LockPage> {
        let start_time = std::time::Instant::now();

        let start = request
            .cursor
            .as_deref()
            .map(ContinuationToken::decode)
            .transpose()?;
        let limit = self.pagination.clamp(request.limit);

        let page = self
            .store
            .scan(ScanRequest::new(request.filters.to_predicate(), limit).starting_at(start))
            .await?;
        let locks = self.resolve_page(ctx, &page.records).await?;

        metrics::histogram!(
            "lfs_locks_registry_list_locks_duration_seconds",
            "backend" => self.store.backend_name()
        )
        .record(start_time.elapsed().as_secs_f64());
        metrics::counter!(
            "lfs_locks_registry_list_locks_total",
            "backend" => self.store.backend_name()
        )
        .increment(1);

        debug!(limit, returned = locks.len(), more = page.next_token.is_some(), "Listed locks");

        Ok(LockPage {
            locks,
            next_cursor: page.next_token.as_ref().map(ContinuationToken::encode),
        })
    }

    /// Split the lock table into the caller's locks and everyone else's.
    ///
    /// Requires push access. Both halves page independently behind one
    /// combined cursor; each gets `limit / 2` records per call.
    #[instrument(skip(self, ctx, request), fields(principal_id = %ctx.principal_id(), request_id = %ctx.request_id(), limit = ?request.limit))]
    pub async fn verify_locks(&self, ctx: &RequestContext, request: VerifyRequest) -> LockResult<VerifyResult> {
        self.require_push(ctx, "verify_locks")?;
        let start_time = std::time::Instant::now();

        if let Some(ref_name) = request.ref_name.as_deref() {
            debug!(ref_name, "Verifying locks for ref");
        }

        let mut cursors = request
            .cursor
            .as_deref()
            .map(CursorSet::decode)
            .transpose()?
            .unwrap_or_default();
        let limit = self.pagination.clamp_with_floor(request.limit, VERIFY_LIMIT_FLOOR);
        let half = limit / 2;

        let ours = PageStream::new(OURS, owned_by(ctx.principal_id()), cursors.take(OURS));
        let theirs = PageStream::new(THEIRS, not_owned_by(ctx.principal_id()), cursors.take(THEIRS));

        let store = self.store.as_ref();
        let (ours_page, theirs_page) = tokio::try_join!(
            async {
                let page = ours.fetch(store, half).await?;
                let views = self.resolve_page(ctx, &page.records).await?;
                Ok::<_, LockError>((views, page.next_token))
            },
            async {
                let page = theirs.fetch(store, half).await?;
                let views = self.resolve_page(ctx, &page.records).await?;
                Ok::<_, LockError>((views, page.next_token))
            },
        )?;

        let (ours, ours_token) = ours_page;
        let (theirs, theirs_token) = theirs_page;
        let next_cursor = merge_continuations([(OURS, ours_token), (THEIRS, theirs_token)]).encode();

        metrics::histogram!(
            "lfs_locks_registry_verify_locks_duration_seconds",
            "backend" => self.store.backend_name()
        )
        .record(start_time.elapsed().as_secs_f64());
        metrics::counter!(
            "lfs_locks_registry_verify_locks_total",
            "backend" => self.store.backend_name()
        )
        .increment(1);

        debug!(
            half,
            ours = ours.len(),
            theirs = theirs.len(),
            more = next_cursor.is_some(),
            "Verified locks"
        );

        Ok(VerifyResult {
            ours,
            theirs,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InsertOutcome, MemoryLockStore, StaticIdentityResolver};
    use async_trait::async_trait;
    use lfs_locks_common::RepositoryAccess;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Wraps a store and counts every call that reaches it.
    struct CountingStore {
        inner: MemoryLockStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn new(inner: MemoryLockStore) -> Self {
            Self {
                inner,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LockStore for CountingStore {
        async fn try_insert(&self, lock: Lock) -> LockResult<InsertOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.try_insert(lock).await
        }

        async fn scan(&self, request: ScanRequest) -> LockResult<ScanPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.scan(request).await
        }

        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    /// Fails every lookup.
    struct FailingResolver;

    #[async_trait]
    impl IdentityResolver for FailingResolver {
        async fn resolve(
            &self,
            _ctx: &RequestContext,
            _ids: &BTreeSet<String>,
        ) -> LockResult<HashMap<String, crate::Identity>> {
            Err(LockError::IdentityResolution("resolver down".to_string()))
        }
    }

    fn resolver() -> Arc<StaticIdentityResolver> {
        Arc::new(
            StaticIdentityResolver::new()
                .with("u1", "alice", "Alice")
                .with("u2", "bob", "Bob"),
        )
    }

    fn ctx(principal: &str, access: RepositoryAccess) -> RequestContext {
        RequestContext::new(principal.to_string(), access).unwrap()
    }

    fn seeded() -> MemoryLockStore {
        MemoryLockStore::with_locks([Lock::new("a.bin", "u1", ""), Lock::new("b.bin", "u2", "")])
    }

    #[tokio::test]
    async fn test_try_lock_requires_push_without_touching_store() {
        let store = Arc::new(CountingStore::new(MemoryLockStore::new()));
        let registry = LockRegistry::new(store.clone(), resolver(), PaginationConfig::default());

        for access in [RepositoryAccess::None, RepositoryAccess::Read] {
            let err = registry
                .try_lock(&ctx("u1", access), "a.bin", "")
                .await
                .unwrap_err();
            assert!(matches!(err, LockError::Forbidden));
        }
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_verify_requires_push_without_touching_store() {
        let store = Arc::new(CountingStore::new(seeded()));
        let registry = LockRegistry::new(store.clone(), resolver(), PaginationConfig::default());

        let err = registry
            .verify_locks(&ctx("u1", RepositoryAccess::Read), VerifyRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Forbidden));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_try_lock_conflict_reports_holder() {
        let registry = LockRegistry::new(Arc::new(seeded()), resolver(), PaginationConfig::default());

        let acquisition = registry
            .try_lock(&ctx("u2", RepositoryAccess::Write), "a.bin", "refs/heads/main")
            .await
            .unwrap();
        assert!(!acquisition.acquired);
        assert_eq!(acquisition.lock.owner.name, "alice (Alice)");

        let acquisition = registry
            .try_lock(&ctx("u2", RepositoryAccess::Write), "c.bin", "")
            .await
            .unwrap();
        assert!(acquisition.acquired);
        assert_eq!(acquisition.lock.id, "c.bin");
        assert_eq!(acquisition.lock.owner.name, "bob (Bob)");
    }

    #[tokio::test]
    async fn test_try_lock_rejects_empty_path() {
        let registry = LockRegistry::new(Arc::new(MemoryLockStore::new()), resolver(), PaginationConfig::default());
        let err = registry
            .try_lock(&ctx("u1", RepositoryAccess::Write), "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_needs_no_push_access() {
        let registry = LockRegistry::new(Arc::new(seeded()), resolver(), PaginationConfig::default());
        let page = registry
            .list_locks(&ctx("u3", RepositoryAccess::Read), ListRequest::default())
            .await
            .unwrap();
        assert_eq!(page.locks.len(), 2);
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_list_malformed_cursor() {
        let registry = LockRegistry::new(Arc::new(seeded()), resolver(), PaginationConfig::default());
        let request = ListRequest {
            cursor: Some("%%%not-a-cursor".to_string()),
            ..Default::default()
        };
        let err = registry
            .list_locks(&ctx("u1", RepositoryAccess::Read), request)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::MalformedCursor(_)));
    }

    #[tokio::test]
    async fn test_empty_cursor_is_malformed() {
        let registry = LockRegistry::new(Arc::new(seeded()), resolver(), PaginationConfig::default());
        let request = ListRequest {
            cursor: Some(String::new()),
            ..Default::default()
        };
        let err = registry
            .list_locks(&ctx("u1", RepositoryAccess::Read), request)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::MalformedCursor(_)));

        let request = VerifyRequest {
            cursor: Some(String::new()),
            ..Default::default()
        };
        let err = registry
            .verify_locks(&ctx("u1", RepositoryAccess::Write), request)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::MalformedCursor(_)));
    }

    #[tokio::test]
    async fn test_identity_failure_fails_page() {
        let registry = LockRegistry::new(Arc::new(seeded()), Arc::new(FailingResolver), PaginationConfig::default());
        let err = registry
            .list_locks(&ctx("u1", RepositoryAccess::Read), ListRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::IdentityResolution(_)));
    }

    #[tokio::test]
    async fn test_unknown_owner_fails_page() {
        let store = MemoryLockStore::with_locks([Lock::new("a.bin", "u1", ""), Lock::new("z.bin", "ghost", "")]);
        let registry = LockRegistry::new(Arc::new(store), resolver(), PaginationConfig::default());
        let err = registry
            .list_locks(&ctx("u1", RepositoryAccess::Read), ListRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::IdentityResolution(_)));
    }

    #[tokio::test]
    async fn test_empty_page_skips_resolver() {
        let registry = LockRegistry::new(
            Arc::new(MemoryLockStore::new()),
            Arc::new(FailingResolver),
            PaginationConfig::default(),
        );
        let page = registry
            .list_locks(&ctx("u1", RepositoryAccess::Read), ListRequest::default())
            .await
            .unwrap();
        assert_eq!(page, LockPage::default());

        let result = registry
            .verify_locks(&ctx("u1", RepositoryAccess::Write), VerifyRequest::default())
            .await
            .unwrap();
        assert_eq!(result, VerifyResult::default());
    }

    #[tokio::test]
    async fn test_verify_partitions_by_owner() {
        let registry = LockRegistry::new(Arc::new(seeded()), resolver(), PaginationConfig::default());
        let result = registry
            .verify_locks(
                &ctx("u1", RepositoryAccess::Write),
                VerifyRequest {
                    ref_name: Some("refs/heads/main".to_string()),
                    limit: Some(10),
                    cursor: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(result.ours.len(), 1);
        assert_eq!(result.ours[0].path, "a.bin");
        assert_eq!(result.theirs.len(), 1);
        assert_eq!(result.theirs[0].path, "b.bin");
        assert!(result.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_verify_limit_floor_gives_each_stream_one() {
        let store = MemoryLockStore::with_locks([
            Lock::new("a.bin", "u1", ""),
            Lock::new("b.bin", "u1", ""),
            Lock::new("c.bin", "u2", ""),
        ]);
        let registry = LockRegistry::new(Arc::new(store), resolver(), PaginationConfig::default());
        let result = registry
            .verify_locks(
                &ctx("u1", RepositoryAccess::Write),
                VerifyRequest {
                    limit: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(result.ours.len(), 1);
        assert_eq!(result.theirs.len(), 1);

        // only the unfinished stream keeps a token
        let cursors = CursorSet::decode(result.next_cursor.as_deref().unwrap()).unwrap();
        assert!(cursors.get(OURS).is_some());
        assert!(cursors.get(THEIRS).is_none());
    }

    #[tokio::test]
    async fn test_verify_rejects_non_object_cursor() {
        let registry = LockRegistry::new(Arc::new(seeded()), resolver(), PaginationConfig::default());
        let cursor = crate::cursor::encode(&serde_json::json!(["ours"]));
        let err = registry
            .verify_locks(
                &ctx("u1", RepositoryAccess::Write),
                VerifyRequest {
                    cursor: Some(cursor),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::MalformedCursor(_)));
    }

    #[test]
    fn test_merge_continuations() {
        let token = ContinuationToken::new(serde_json::json!({"path": "a.bin"}));

        let merged = merge_continuations([(OURS, None), (THEIRS, Some(token.clone()))]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get(THEIRS), Some(&token));

        assert!(merge_continuations([(OURS, None), (THEIRS, None)]).encode().is_none());
    }
}
