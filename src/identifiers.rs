// Copyright 2025 Cowboy AI, LLC.

//! Identifier types for host records and correction runs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifier of a host record (session, policy) as the host encodes it
///
/// Hosts hand out the same identifier as a JSON number in one place and as a
/// string in another (mapping keys are always strings). `HostKey` keeps the
/// canonical text form so `42` and `"42"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct HostKey(String);

impl HostKey {
    /// Create a key from any textual identifier
    ///
    /// Returns `None` for blank input.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Read a scalar JSON value as a key
    ///
    /// Only strings and numbers qualify. Whole floats collapse to their
    /// integer spelling so `42.0` matches `42`.
    pub fn from_scalar(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::new(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self(i.to_string()))
                } else if let Some(u) = n.as_u64() {
                    Some(Self(u.to_string()))
                } else {
                    let f = n.as_f64()?;
                    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                        Some(Self((f as i64).to_string()))
                    } else {
                        Some(Self(f.to_string()))
                    }
                }
            }
            _ => None,
        }
    }

    /// Canonical text form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert back to the JSON value the host most likely expects
    ///
    /// Keys whose text is exactly an integer's spelling become numbers;
    /// anything else (`"007"`, `"+5"`, `"tk-1"`) stays a string.
    pub fn to_value(&self) -> Value {
        match self.0.parse::<i64>() {
            Ok(i) if i.to_string() == self.0 => Value::from(i),
            _ => Value::String(self.0.clone()),
        }
    }
}

impl fmt::Display for HostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for HostKey {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<i32> for HostKey {
    fn from(id: i32) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for HostKey {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl TryFrom<Value> for HostKey {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_scalar(&value).ok_or_else(|| format!("not a host identifier: {value}"))
    }
}

impl From<HostKey> for Value {
    fn from(key: HostKey) -> Self {
        key.to_value()
    }
}

/// Identity of a host order, used to key engine side-tables
///
/// The host picks the value (a uid, a database id); the engine never stamps
/// anything onto the order itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderKey(String);

impl OrderKey {
    /// Create an order key
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlates every correction fired by one `schedule` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrectionRunId(Uuid);

impl CorrectionRunId {
    /// Create a new random run ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrectionRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrectionRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
