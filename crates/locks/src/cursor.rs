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

//! Cursor codec.
//!
//! Cursors are opaque to clients and to the registry. A store hands back a
//! [`ContinuationToken`] (arbitrary JSON in the store's own shape); the codec
//! wraps it as URL-safe base64 of its JSON text so it can travel in a query
//! parameter or a JSON string. Only the issuing store ever looks inside.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{LockError, LockResult};

/// Encode an arbitrary JSON value as a transport-safe string.
pub fn encode(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string())
}

/// Decode a string produced by [`encode`].
pub fn decode(encoded: &str) -> LockResult<Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim())
        .map_err(|e| LockError::MalformedCursor(format!("invalid base64: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| LockError::MalformedCursor(format!("invalid payload: {}", e)))
}

/// Store-native continuation position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(Value);

impl ContinuationToken {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Encode as a single-stream cursor.
    pub fn encode(&self) -> String {
        encode(&self.0)
    }

    /// Decode a single-stream cursor.
    pub fn decode(encoded: &str) -> LockResult<Self> {
        decode(encoded).map(Self)
    }
}

/// Continuation tokens for several independently paginated streams, keyed
/// by stream name, behind one client-visible cursor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorSet {
    tokens: BTreeMap<String, ContinuationToken>,
}

impl CursorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a combined cursor; it must carry a JSON object.
    pub fn decode(encoded: &str) -> LockResult<Self> {
        match decode(encoded)? {
            Value::Object(map) => Ok(Self {
                tokens: map
                    .into_iter()
                    .map(|(name, token)| (name, ContinuationToken::new(token)))
                    .collect(),
            }),
            other => Err(LockError::MalformedCursor(format!(
                "expected a cursor object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Encode the set; `None` when no stream has more to return.
    pub fn encode(&self) -> Option<String> {
        if self.tokens.is_empty() {
            return None;
        }
        let map: serde_json::Map<String, Value> = self
            .tokens
            .iter()
            .map(|(name, token)| (name.clone(), token.as_value().clone()))
            .collect();
        Some(encode(&Value::Object(map)))
    }

    pub fn get(&self, stream: &str) -> Option<&ContinuationToken> {
        self.tokens.get(stream)
    }

    pub fn take(&mut self, stream: &str) -> Option<ContinuationToken> {
        self.tokens.remove(stream)
    }

    pub fn insert(&mut self, stream: impl Into<String>, token: ContinuationToken) {
        self.tokens.insert(stream.into(), token);
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
