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

//! Identity enrichment: turning owner identity ids into display names.
//!
//! Lock records only carry an opaque `owner_identity`. Every page returned to
//! a client is enriched with one batched [`IdentityResolver::resolve`] call.

use async_trait::async_trait;
use lfs_locks_common::RequestContext;
use std::collections::{BTreeSet, HashMap};

use crate::{LockError, LockResult};

/// Public GitHub GraphQL endpoint.
pub const DEFAULT_GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// A resolved principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub login: String,
    pub name: String,
}

impl Identity {
    pub fn new(login: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            name: name.into(),
        }
    }

    /// `"<login> (<name>)"`, the `owner.name` shown to LFS clients.
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.login, self.name)
    }
}

/// Batch identity lookup.
///
/// Implementations either answer for every requested id or fail. Ids left out
/// of the returned map are treated as a resolution failure by the caller.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(
        &self,
        ctx: &RequestContext,
        ids: &BTreeSet<String>,
    ) -> LockResult<HashMap<String, Identity>>;
}

/// Resolver backed by a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityResolver {
    identities: HashMap<String, Identity>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, login: impl Into<String>, name: impl Into<String>) -> Self {
        self.identities.insert(id.into(), Identity::new(login, name));
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(
        &self,
        _ctx: &RequestContext,
        ids: &BTreeSet<String>,
    ) -> LockResult<HashMap<String, Identity>> {
        ids.iter()
            .map(|id| {
                self.identities
                    .get(id)
                    .map(|identity| (id.clone(), identity.clone()))
                    .ok_or_else(|| LockError::IdentityResolution(format!("unknown identity {}", id)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lfs_locks_common::RepositoryAccess;

    fn ctx() -> RequestContext {
        RequestContext::new("u1".to_string(), RepositoryAccess::Read).unwrap()
    }

    #[test]
    fn test_display_name() {
        assert_eq!(Identity::new("alice", "Alice A").display_name(), "alice (Alice A)");
    }

    #[tokio::test]
    async fn test_static_resolves_known_ids() {
        let resolver = StaticIdentityResolver::new()
            .with("u1", "alice", "Alice")
            .with("u2", "bob", "Bob");
        let ids: BTreeSet<String> = ["u1".to_string(), "u2".to_string()].into();

        let resolved = resolver.resolve(&ctx(), &ids).await.unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["u2"].login, "bob");
    }

    #[tokio::test]
    async fn test_static_unknown_id_fails() {
        let resolver = StaticIdentityResolver::new().with("u1", "alice", "Alice");
        let ids: BTreeSet<String> = ["u1".to_string(), "ghost".to_string()].into();

        let err = resolver.resolve(&ctx(), &ids).await.unwrap_err();
        assert!(matches!(err, LockError::IdentityResolution(_)));
    }
}
