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

//! Request Context
//!
//! ## Purpose
//! Carries the authenticated principal, its repository capability and the
//! forwarded credentials through every registry and collaborator call.
//!
//! ## Design Philosophy
//! - **Explicit**: the capability level travels with the request, it is never
//!   read from ambient session state
//! - **Tracing**: request_id for log correlation
//! - **Immutable**: Context should be passed by reference, not mutated

use std::collections::HashMap;
use std::fmt;
use ulid::Ulid;

use crate::RepositoryAccess;

/// Request context for one lock API call.
///
/// ## Usage Pattern
/// ```rust
/// use lfs_locks_common::{RepositoryAccess, RequestContext};
///
/// let ctx = RequestContext::new("MDQ6VXNlcjE=".to_string(), RepositoryAccess::Write)?
///     .with_authorization("Bearer gho_xxx".to_string());
/// assert!(ctx.access().can_push());
/// # Ok::<(), lfs_locks_common::RequestContextError>(())
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Identity id of the authenticated principal (REQUIRED)
    pub principal_id: String,

    /// Capability on the target repository
    pub access: RepositoryAccess,

    /// Authorization header value, forwarded to identity lookups
    pub authorization: Option<String>,

    /// Request ID (for tracing)
    pub request_id: String,

    /// Metadata (extensible key-value pairs)
    pub metadata: HashMap<String, String>,
}

impl RequestContext {
    /// Create a new RequestContext for an authenticated principal.
    ///
    /// ## Validation
    /// - `principal_id` must not be empty
    pub fn new(principal_id: String, access: RepositoryAccess) -> Result<Self, RequestContextError> {
        if principal_id.trim().is_empty() {
            return Err(RequestContextError::MissingPrincipal);
        }

        Ok(Self {
            principal_id,
            access,
            authorization: None,
            request_id: Ulid::new().to_string(),
            metadata: HashMap::new(),
        })
    }

    /// Set forwarded authorization (builder pattern)
    pub fn with_authorization(mut self, authorization: String) -> Self {
        self.authorization = Some(authorization);
        self
    }

    /// Override the generated request id (builder pattern)
    pub fn with_request_id(mut self, request_id: String) -> Self {
        if !request_id.is_empty() {
            self.request_id = request_id;
        }
        self
    }

    /// Add metadata (builder pattern)
    pub fn with_metadata(mut self, key: String, value: String) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Get principal_id
    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    /// Get access level
    pub fn access(&self) -> RepositoryAccess {
        self.access
    }

    /// Get forwarded authorization
    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// Get request_id
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Get metadata value
    pub fn get_metadata(&self, key: &str) -> Option<&String> {
        self.metadata.get(key)
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("principal_id", &self.principal_id)
            .field("access", &self.access)
            .field("authorization", &self.authorization.as_ref().map(|_| "<redacted>"))
            .field("request_id", &self.request_id)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// RequestContext errors
#[derive(Debug, thiserror::Error)]
pub enum RequestContextError {
    /// Missing required principal id
    #[error("Missing required principal id in RequestContext")]
    MissingPrincipal,

    /// Unknown repository access level
    #[error("Invalid repository access level: {0}")]
    InvalidAccess(String),
}
