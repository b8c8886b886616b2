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


//! lfs-locks-server binary.

use lfs_locks::{create_lock_store_from_config, IdentityResolver, LockRegistry};
use lfs_locks_server::{create_locks_router, tracing_setup, ServerConfig, ServerError};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[cfg(feature = "github-identity")]
fn identity_resolver(config: &ServerConfig) -> Result<Arc<dyn IdentityResolver>, ServerError> {
    Ok(Arc::new(lfs_locks::GitHubIdentityResolver::new(config.github_graphql_url.clone())))
}

#[cfg(not(feature = "github-identity"))]
fn identity_resolver(_config: &ServerConfig) -> Result<Arc<dyn IdentityResolver>, ServerError> {
    Err(ServerError::Config(
        "owner names need an identity resolver; build with the 'github-identity' feature".to_string(),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_setup::init_tracing()?;

    let config = ServerConfig::from_env()?;
    let store = create_lock_store_from_config(&config.locks.backend).await?;
    let registry = Arc::new(LockRegistry::new(
        store,
        identity_resolver(&config)?,
        config.locks.pagination,
    ));

    let listener = TcpListener::bind(config.http_addr).await.map_err(ServerError::from)?;
    info!(
        addr = %config.http_addr,
        backend = registry.backend_name(),
        page_max = config.locks.pagination.max,
        "lfs-locks server starting"
    );

    axum::serve(listener, create_locks_router(registry))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("lfs-locks server stopped");
    Ok(())
}
