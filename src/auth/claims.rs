//! Decoded token claims.
//!
//! Claims are produced once per successful verification and never mutated.
//! The `sub` field carries a user identifier and is redacted in Debug output
//! to keep it out of logs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Claim set decoded from a verified token.
///
/// A token is well-formed only if it carries `sub` (subject identifier) and
/// `exp` (expiry, seconds since epoch); both are required fields here and
/// their absence fails deserialization. Every other claim is kept in an open
/// map reachable through [`Claims::get`].
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier - redacted in Debug output.
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// All remaining claims, untyped.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("extra", &self.extra)
            .finish()
    }
}

impl Claims {
    /// The subject identifier (`sub` claim).
    pub fn subject(&self) -> &str {
        &self.sub
    }

    /// The expiry timestamp (`exp` claim, Unix epoch seconds).
    pub fn expires_at(&self) -> i64 {
        self.exp
    }

    /// Look up a claim by name.
    ///
    /// Covers the open claim map as well as the typed `sub`/`exp` fields, so
    /// `get("sub")` and `get("exp")` behave like any other lookup.
    pub fn get(&self, name: &str) -> Option<Value> {
        match name {
            "sub" => Some(Value::String(self.sub.clone())),
            "exp" => Some(Value::from(self.exp)),
            _ => self.extra.get(name).cloned(),
        }
    }
}
