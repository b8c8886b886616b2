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

//! Lock record and its Git LFS wire view.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// An exclusive claim on a repository path.
///
/// `path` is both the unique key and the lock id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Locked file path (unique)
    pub path: String,
    /// Identity id of the holder
    pub owner_identity: String,
    /// Ref the lock was requested against, empty when none was given
    #[serde(rename = "ref", default)]
    pub ref_name: String,
    /// ISO-8601 acquisition time, immutable
    pub created_at: String,
}

impl Lock {
    /// Build a lock stamped with the current time.
    pub fn new(path: impl Into<String>, owner_identity: impl Into<String>, ref_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            owner_identity: owner_identity.into(),
            ref_name: ref_name.into(),
            created_at: now_iso8601(),
        }
    }

    /// Replace the creation timestamp (for fixtures and store decoding).
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = created_at.into();
        self
    }

    /// Lock id as exposed over the API.
    pub fn id(&self) -> &str {
        &self.path
    }

    /// Wire view with a resolved owner display name.
    pub fn to_view(&self, owner_name: impl Into<String>) -> LockView {
        LockView {
            id: self.path.clone(),
            path: self.path.clone(),
            locked_at: self.created_at.clone(),
            owner: LockOwner {
                name: owner_name.into(),
            },
        }
    }
}

/// Current UTC time in RFC 3339 form.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Lock as returned by the locking API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockView {
    pub id: String,
    pub path: String,
    pub locked_at: String,
    pub owner: LockOwner,
}

/// Owner block of a [`LockView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub name: String,
}
