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

//! Repository capability levels.
//!
//! The access level is derived upstream (from the hosting provider's
//! repository permissions) and handed to the registry inside the
//! [`RequestContext`](crate::RequestContext). Levels are totally ordered so
//! gates read as a plain comparison: `access >= RepositoryAccess::Write`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RequestContextError;

/// Capability a principal holds on the target repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryAccess {
    /// No access at all
    #[default]
    None,
    /// May list locks
    Read,
    /// May create and verify locks (push access)
    Write,
}

impl RepositoryAccess {
    /// Whether this level allows mutating lock operations.
    pub fn can_push(self) -> bool {
        self >= RepositoryAccess::Write
    }

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            RepositoryAccess::None => "none",
            RepositoryAccess::Read => "read",
            RepositoryAccess::Write => "write",
        }
    }
}

impl fmt::Display for RepositoryAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryAccess {
    type Err = RequestContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(RepositoryAccess::None),
            "read" => Ok(RepositoryAccess::Read),
            "write" => Ok(RepositoryAccess::Write),
            other => Err(RequestContextError::InvalidAccess(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(RepositoryAccess::None < RepositoryAccess::Read);
        assert!(RepositoryAccess::Read < RepositoryAccess::Write);
        assert_eq!(
            [RepositoryAccess::Write, RepositoryAccess::None, RepositoryAccess::Read]
                .iter()
                .max(),
            Some(&RepositoryAccess::Write)
        );
    }

    #[test]
    fn test_can_push() {
        assert!(!RepositoryAccess::None.can_push());
        assert!(!RepositoryAccess::Read.can_push());
        assert!(RepositoryAccess::Write.can_push());
    }

    #[test]
    fn test_parse() {
        assert_eq!("write".parse::<RepositoryAccess>().unwrap(), RepositoryAccess::Write);
        assert_eq!(" Read ".parse::<RepositoryAccess>().unwrap(), RepositoryAccess::Read);
        assert_eq!("NONE".parse::<RepositoryAccess>().unwrap(), RepositoryAccess::None);
        assert!(matches!(
            "admin".parse::<RepositoryAccess>(),
            Err(RequestContextError::InvalidAccess(v)) if v == "admin"
        ));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&RepositoryAccess::Read).unwrap();
        assert_eq!(json, "\"read\"");
        let parsed: RepositoryAccess = serde_json::from_str("\"write\"").unwrap();
        assert_eq!(parsed, RepositoryAccess::Write);
    }
}
