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

//! Server configuration.
//!
//! ## Environment Variables
//! - `LFS_LOCKS_HTTP_ADDR`: Listen address (default: `0.0.0.0:8080`)
//! - `LFS_LOCKS_GITHUB_GRAPHQL_URL`: GraphQL endpoint for owner names
//!   (default: `https://api.github.com/graphql`)
//! - everything read by [`LocksConfig`] (backend and pagination)

use lfs_locks::{LockError, LocksConfig, DEFAULT_GITHUB_GRAPHQL_URL};
use std::net::SocketAddr;
use thiserror::Error;

pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    pub github_graphql_url: String,
    pub locks: LocksConfig,
}

impl ServerConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("LFS_LOCKS_HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string());
        let http_addr = raw_addr
            .parse()
            .map_err(|e| ServerError::Config(format!("LFS_LOCKS_HTTP_ADDR {:?}: {}", raw_addr, e)))?;

        Ok(Self {
            http_addr,
            github_graphql_url: lookup("LFS_LOCKS_GITHUB_GRAPHQL_URL")
                .unwrap_or_else(|| DEFAULT_GITHUB_GRAPHQL_URL.to_string()),
            locks: LocksConfig::from_lookup(&lookup)?,
        })
    }

    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}
