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


//! # lfs-locks-server
//!
//! HTTP front end for the [`lfs_locks`] registry, speaking the Git LFS
//! locking API (`/locks`, `/locks/verify`).

pub mod config;
pub mod http;
pub mod tracing_setup;

pub use config::{ServerConfig, ServerError};
pub use http::{create_locks_router, extract_context_from_headers, start_locks_http_server, ApiError, LFS_CONTENT_TYPE};
