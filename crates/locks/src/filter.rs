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

//! Filter builder.
//!
//! Optional query filters become an ordered list of [`Clause`]s combined
//! with AND. Clauses name logical lock fields; each backend maps them onto
//! its own columns or attribute names.

use serde::Deserialize;

use crate::Lock;

/// Logical lock attribute a clause can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockField {
    Path,
    OwnerIdentity,
    Ref,
}

impl LockField {
    /// Logical name, independent of any storage schema.
    pub fn name(self) -> &'static str {
        match self {
            LockField::Path => "path",
            LockField::OwnerIdentity => "owner",
            LockField::Ref => "ref",
        }
    }

    pub fn value_of(self, lock: &Lock) -> &str {
        match self {
            LockField::Path => &lock.path,
            LockField::OwnerIdentity => &lock.owner_identity,
            LockField::Ref => &lock.ref_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
}

/// One predicate term: `field <op> value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: LockField,
    pub comparison: Comparison,
    pub value: String,
}

impl Clause {
    pub fn eq(field: LockField, value: impl Into<String>) -> Self {
        Self {
            field,
            comparison: Comparison::Equal,
            value: value.into(),
        }
    }

    pub fn ne(field: LockField, value: impl Into<String>) -> Self {
        Self {
            field,
            comparison: Comparison::NotEqual,
            value: value.into(),
        }
    }

    pub fn matches(&self, lock: &Lock) -> bool {
        let actual = self.field.value_of(lock);
        match self.comparison {
            Comparison::Equal => actual == self.value,
            Comparison::NotEqual => actual != self.value,
        }
    }
}

/// Conjunction of clauses. Empty means "every record".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, lock: &Lock) -> bool {
        self.clauses.iter().all(|clause| clause.matches(lock))
    }
}

pub fn id_clause(id: &str) -> Clause {
    Clause::eq(LockField::Path, id)
}

pub fn path_clause(path: &str) -> Clause {
    Clause::eq(LockField::Path, path)
}

pub fn ref_clause(refspec: &str) -> Clause {
    Clause::eq(LockField::Ref, refspec)
}

/// Locks held by `principal_id`.
pub fn owned_by(principal_id: &str) -> Predicate {
    Predicate::all().with(Clause::eq(LockField::OwnerIdentity, principal_id))
}

/// Locks held by anyone except `principal_id`.
pub fn not_owned_by(principal_id: &str) -> Predicate {
    Predicate::all().with(Clause::ne(LockField::OwnerIdentity, principal_id))
}

/// Optional list filters as they arrive from the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LockFilters {
    pub id: Option<String>,
    pub path: Option<String>,
    pub refspec: Option<String>,
}

impl LockFilters {
    /// Clauses for the supplied filters, in id, path, refspec order.
    ///
    /// `id` and `path` both target the path field and are kept as two
    /// separate clauses when both are given.
    pub fn to_predicate(&self) -> Predicate {
        let mut predicate = Predicate::all();
        if let Some(id) = &self.id {
            predicate.push(id_clause(id));
        }
        if let Some(path) = &self.path {
            predicate.push(path_clause(path));
        }
        if let Some(refspec) = &self.refspec {
            predicate.push(ref_clause(refspec));
        }
        predicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock(path: &str, owner: &str, r: &str) -> Lock {
        Lock::new(path, owner, r)
    }

    #[test]
    fn test_no_filters_no_predicate() {
        let predicate = LockFilters::default().to_predicate();
        assert!(predicate.is_empty());
        assert!(predicate.matches(&lock("a.bin", "u1", "")));
    }

    #[test]
    fn test_single_filters() {
        let by_ref = LockFilters {
            refspec: Some("main".into()),
            ..Default::default()
        }
        .to_predicate();
        assert_eq!(by_ref.clauses(), &[Clause::eq(LockField::Ref, "main")]);
        assert!(by_ref.matches(&lock("a.bin", "u1", "main")));
        assert!(!by_ref.matches(&lock("a.bin", "u1", "dev")));
    }

    #[test]
    fn test_id_and_path_both_kept() {
        let predicate = LockFilters {
            id: Some("a.bin".into()),
            path: Some("a.bin".into()),
            refspec: None,
        }
        .to_predicate();
        assert_eq!(predicate.clauses().len(), 2);
        assert!(predicate.clauses().iter().all(|c| c.field == LockField::Path));
        assert!(predicate.matches(&lock("a.bin", "u1", "")));
    }

    #[test]
    fn test_conflicting_id_and_path_match_nothing() {
        let predicate = LockFilters {
            id: Some("a.bin".into()),
            path: Some("b.bin".into()),
            refspec: None,
        }
        .to_predicate();
        assert!(!predicate.matches(&lock("a.bin", "u1", "")));
        assert!(!predicate.matches(&lock("b.bin", "u1", "")));
    }

    #[test]
    fn test_conjunction() {
        let predicate = LockFilters {
            id: None,
            path: Some("a.bin".into()),
            refspec: Some("main".into()),
        }
        .to_predicate();
        assert!(predicate.matches(&lock("a.bin", "u1", "main")));
        assert!(!predicate.matches(&lock("a.bin", "u1", "dev")));
        assert!(!predicate.matches(&lock("b.bin", "u1", "main")));
    }

    #[test]
    fn test_ownership_partition() {
        let mine = lock("a.bin", "u1", "");
        let theirs = lock("b.bin", "u2", "");
        assert!(owned_by("u1").matches(&mine));
        assert!(!owned_by("u1").matches(&theirs));
        assert!(not_owned_by("u1").matches(&theirs));
        assert!(!not_owned_by("u1").matches(&mine));
    }
}
