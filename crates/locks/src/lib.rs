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


//! # lfs-locks
//!
//! ## Purpose
//! Server-side core of the Git LFS file-locking API: exclusive per-path locks
//! with filtered, cursor-paginated listing and an ours/theirs verification
//! view used by `git lfs push`.
//!
//! ## Design Decisions
//! - **Store-enforced exclusivity**: every acquisition is one atomic
//!   conditional insert; the registry holds no mutable state
//! - **Opaque cursors**: store-native continuation tokens are wrapped in
//!   [`ContinuationToken`] and only interpreted by the store that issued them
//! - **Independent verify streams**: `ours` and `theirs` paginate separately
//!   behind one combined [`CursorSet`]
//! - **Capability gate first**: writes and verification require push access
//!   and are rejected before the store is touched
//!
//! ## Backend Support
//!
//! - **Memory**: `BTreeMap`-based (always available, for testing)
//! - **SQLite**: Persistent, single-node (feature: `sqlite-backend`)
//! - **DynamoDB**: Conditional puts on a `path`-keyed table (feature: `ddb-backend`)
//!
//! ## Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lfs_locks::{LockRegistry, MemoryLockStore, PaginationConfig, StaticIdentityResolver};
//! use lfs_locks_common::{RepositoryAccess, RequestContext};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = LockRegistry::new(
//!     Arc::new(MemoryLockStore::new()),
//!     Arc::new(StaticIdentityResolver::new().with("u1", "alice", "Alice")),
//!     PaginationConfig::default(),
//! );
//!
//! let ctx = RequestContext::new("u1".to_string(), RepositoryAccess::Write)?;
//! let acquisition = registry.try_lock(&ctx, "assets/logo.psd", "refs/heads/main").await?;
//! assert!(acquisition.acquired);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod identity;
pub mod lock;
pub mod memory;
pub mod registry;
pub mod store;

#[cfg(feature = "sqlite-backend")]
pub mod sql;

#[cfg(feature = "ddb-backend")]
pub mod ddb;

#[cfg(feature = "github-identity")]
pub mod github;

pub use config::{create_lock_store_from_config, BackendType, LocksConfig, PaginationConfig};
pub use cursor::{ContinuationToken, CursorSet};
pub use error::{LockError, LockResult, FORBIDDEN_MESSAGE};
pub use filter::{
    id_clause, not_owned_by, owned_by, path_clause, ref_clause, Clause, Comparison, LockField,
    LockFilters, Predicate,
};
pub use identity::{
    Identity, IdentityResolver, StaticIdentityResolver, DEFAULT_GITHUB_GRAPHQL_URL,
};
pub use lock::{Lock, LockOwner, LockView};
pub use memory::MemoryLockStore;
pub use registry::{
    merge_continuations, Acquisition, ListRequest, LockPage, LockRegistry, PageStream,
    VerifyRequest, VerifyResult, OURS, THEIRS,
};
pub use store::{InsertOutcome, LockStore, ScanPage, ScanRequest};

#[cfg(feature = "sqlite-backend")]
pub use sql::SqliteLockStore;

#[cfg(feature = "ddb-backend")]
pub use ddb::DynamoDBLockStore;

#[cfg(feature = "github-identity")]
pub use github::GitHubIdentityResolver;
