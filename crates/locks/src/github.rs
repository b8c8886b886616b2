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

//! GitHub GraphQL identity resolver.
//!
//! Identity ids are GitHub node ids. A page of ids is resolved with a single
//! `nodes(ids:)` query, authorised with the caller's own forwarded
//! `Authorization` header.

use async_trait::async_trait;
use lfs_locks_common::RequestContext;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument, warn};

use crate::{Identity, IdentityResolver, LockError, LockResult, DEFAULT_GITHUB_GRAPHQL_URL};

const USERS_QUERY: &str = "query($ids: [ID!]!) { nodes(ids: $ids) { ... on User { id login name } } }";

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<NodesData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct NodesData {
    #[serde(default)]
    nodes: Vec<Option<UserNode>>,
}

#[derive(Debug, Deserialize)]
struct UserNode {
    id: Option<String>,
    login: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// Resolves GitHub node ids to `login`/`name` pairs.
#[derive(Debug, Clone)]
pub struct GitHubIdentityResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl GitHubIdentityResolver {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Default for GitHubIdentityResolver {
    fn default() -> Self {
        Self::new(DEFAULT_GITHUB_GRAPHQL_URL)
    }
}

fn collect_users(response: GraphQlResponse) -> LockResult<HashMap<String, Identity>> {
    if !response.errors.is_empty() {
        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(LockError::IdentityResolution(messages.join("; ")));
    }

    let data = response
        .data
        .ok_or_else(|| LockError::IdentityResolution("GraphQL response carried no data".to_string()))?;

    let mut users = HashMap::new();
    for node in data.nodes.into_iter().flatten() {
        if let (Some(id), Some(login)) = (node.id, node.login) {
            let name = node.name.filter(|n| !n.is_empty()).unwrap_or_else(|| login.clone());
            users.insert(id, Identity { login, name });
        }
    }
    Ok(users)
}

#[async_trait]
impl IdentityResolver for GitHubIdentityResolver {
    #[instrument(skip(self, ctx, ids), fields(request_id = %ctx.request_id(), ids = ids.len()))]
    async fn resolve(
        &self,
        ctx: &RequestContext,
        ids: &BTreeSet<String>,
    ) -> LockResult<HashMap<String, Identity>> {
        let start_time = std::time::Instant::now();

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::USER_AGENT, "lfs-locks")
            .json(&json!({
                "query": USERS_QUERY,
                "variables": { "ids": ids },
            }));
        if let Some(authorization) = ctx.authorization() {
            request = request.header(reqwest::header::AUTHORIZATION, authorization);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "GitHub GraphQL request rejected");
            metrics::counter!(
                "lfs_locks_identity_resolve_total",
                "resolver" => "github",
                "result" => "error"
            )
            .increment(1);
            return Err(LockError::IdentityResolution(format!(
                "GitHub GraphQL returned status {}",
                status
            )));
        }

        let users = collect_users(response.json::<GraphQlResponse>().await?)?;

        let duration = start_time.elapsed();
        metrics::histogram!(
            "lfs_locks_identity_resolve_duration_seconds",
            "resolver" => "github"
        )
        .record(duration.as_secs_f64());
        metrics::counter!(
            "lfs_locks_identity_resolve_total",
            "resolver" => "github",
            "result" => "ok"
        )
        .increment(1);

        debug!(resolved = users.len(), duration_ms = duration.as_millis(), "Resolved GitHub identities");
        Ok(users)
    }
}
