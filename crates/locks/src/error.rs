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

//! Error types for lock registry operations.

use thiserror::Error;

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;

/// Fixed message returned when a caller lacks push access.
pub const FORBIDDEN_MESSAGE: &str = "You are not allowed to push to this repository";

/// Errors that can occur during lock operations.
///
/// Every variant is terminal for the request; nothing is retried internally.
#[derive(Error, Debug)]
pub enum LockError {
    /// Caller's capability is below WRITE
    #[error("You are not allowed to push to this repository")]
    Forbidden,

    /// Cursor could not be decoded or does not belong to the store
    #[error("Malformed cursor: {0}")]
    MalformedCursor(String),

    /// Request argument rejected before reaching the store
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backing store transport or driver failure
    #[error("Lock store unavailable: {0}")]
    StoreUnavailable(String),

    /// Identity enrichment collaborator failed or left an id unresolved
    #[error("Identity resolution failed: {0}")]
    IdentityResolution(String),

    /// Record in the store is missing attributes or has the wrong shape
    #[error("Corrupt lock record: {0}")]
    CorruptRecord(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl LockError {
    /// Whether the failure was caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LockError::Forbidden | LockError::MalformedCursor(_) | LockError::InvalidInput(_)
        )
    }

    /// Short stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LockError::Forbidden => "forbidden",
            LockError::MalformedCursor(_) => "malformed_cursor",
            LockError::InvalidInput(_) => "invalid_input",
            LockError::StoreUnavailable(_) => "store_unavailable",
            LockError::IdentityResolution(_) => "identity_resolution",
            LockError::CorruptRecord(_) => "corrupt_record",
            LockError::ConfigError(_) => "config",
            LockError::SerializationError(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for LockError {
    fn from(err: serde_json::Error) -> Self {
        LockError::SerializationError(err.to_string())
    }
}

#[cfg(feature = "github-identity")]
impl From<reqwest::Error> for LockError {
    fn from(err: reqwest::Error) -> Self {
        LockError::IdentityResolution(format!("GitHub request failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_message_is_fixed() {
        assert_eq!(LockError::Forbidden.to_string(), FORBIDDEN_MESSAGE);
    }

    #[test]
    fn test_client_errors() {
        assert!(LockError::Forbidden.is_client_error());
        assert!(LockError::MalformedCursor("x".into()).is_client_error());
        assert!(LockError::InvalidInput("x".into()).is_client_error());
        assert!(!LockError::StoreUnavailable("x".into()).is_client_error());
        assert!(!LockError::IdentityResolution("x".into()).is_client_error());
    }
}
