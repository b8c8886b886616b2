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

//! # lfs-locks common types
//!
//! Request-scoped context and capability levels shared by the lock registry
//! and its HTTP front end, plus AWS configuration and test helpers.

pub mod access;
pub mod aws_config;
pub mod request_context;
pub mod test_helpers;

pub use access::RepositoryAccess;
pub use aws_config::{DynamoDBConfig, DEFAULT_LOCK_TABLE};
pub use request_context::{RequestContext, RequestContextError};
