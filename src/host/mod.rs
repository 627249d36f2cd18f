// Copyright 2025 Cowboy AI, LLC.

//! Host boundary
//!
//! The host owns sessions and orders. The engine reads sessions and corrects
//! orders through these traits and nothing else. Host objects are
//! duck-typed: an order may or may not expose a given operation, so the
//! traits are phrased as "does it respond to X" plus a generic invoke,
//! rather than one Rust method per host method.

pub mod memory;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::errors::HostError;
use crate::identifiers::{HostKey, OrderKey};

/// An order shared between the host and every pending correction
pub type SharedOrder = Arc<Mutex<dyn HostOrder>>;

/// Read-only view of a host session (one physical service point)
pub trait HostSession: Send + Sync {
    /// Raw session identifier, if the host exposes one
    fn session_id(&self) -> Option<Value>;

    /// Display name of the service point
    fn display_name(&self) -> Option<String>;

    /// Raw value of a configuration field, `None` when absent
    fn config_field(&self, name: &str) -> Option<Value>;

    /// Policy catalog, in whichever shape this host build uses
    fn policy_catalog(&self) -> Option<&PolicyCatalog>;

    /// The order currently active at this session
    fn current_order(&self) -> Option<SharedOrder>;
}

/// Mutable host order
///
/// Every method may fail or be missing on a given host build; callers treat
/// each interaction as best-effort.
pub trait HostOrder: Send {
    /// Stable identity of this order
    fn key(&self) -> OrderKey;

    /// Session the order belongs to
    fn session(&self) -> Option<Arc<dyn HostSession>>;

    /// Whether the order exposes the named operation
    fn responds_to(&self, operation: &str) -> bool;

    /// Invoke a named operation
    fn invoke(&mut self, operation: &str, args: &[Value]) -> Result<Value, HostError>;

    /// Read a raw field
    fn read_field(&self, field: &str) -> Option<Value>;

    /// Write a raw field
    fn write_field(&mut self, field: &str, value: Value) -> Result<(), HostError>;
}

impl std::fmt::Debug for dyn HostOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostOrder").field("key", &self.key()).finish()
    }
}

/// A tax/pricing policy object from the session catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyObject {
    /// Identifier as the host encodes it
    #[serde(default)]
    pub id: Value,

    /// Human label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Remaining host attributes, carried through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl PolicyObject {
    /// Create a policy object with an id and label
    pub fn new(id: impl Into<Value>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            extra: serde_json::Map::new(),
        }
    }

    /// Normalized identifier
    pub fn key(&self) -> Option<HostKey> {
        HostKey::from_scalar(&self.id)
    }

    /// JSON form handed to host setters
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| self.id.clone())
    }
}

/// Session policy catalog
///
/// A given host build exposes exactly one of the two shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PolicyCatalog {
    /// Identifier -> policy mapping
    Mapping(IndexMap<String, PolicyObject>),
    /// Ordered collection, each entry carrying its own `id`
    Ordered(Vec<PolicyObject>),
}

impl PolicyCatalog {
    /// Build a mapping catalog keyed by each policy's own id
    pub fn mapping(policies: impl IntoIterator<Item = PolicyObject>) -> Self {
        PolicyCatalog::Mapping(
            policies
                .into_iter()
                .filter_map(|p| p.key().map(|k| (k.as_str().to_string(), p)))
                .collect(),
        )
    }

    /// Build an ordered catalog
    pub fn ordered(policies: impl IntoIterator<Item = PolicyObject>) -> Self {
        PolicyCatalog::Ordered(policies.into_iter().collect())
    }

    /// Number of policies in the catalog
    pub fn len(&self) -> usize {
        match self {
            PolicyCatalog::Mapping(map) => map.len(),
            PolicyCatalog::Ordered(list) => list.len(),
        }
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_shape_follows_json() {
        let mapping: PolicyCatalog =
            serde_json::from_value(json!({"42": {"id": 42, "name": "Takeaway"}})).unwrap();
        assert!(matches!(mapping, PolicyCatalog::Mapping(_)));

        let ordered: PolicyCatalog =
            serde_json::from_value(json!([{"id": 42, "name": "Takeaway"}, {"name": "no id"}]))
                .unwrap();
        assert!(matches!(ordered, PolicyCatalog::Ordered(_)));
        assert_eq!(ordered.len(), 2);
    }

    #[test]
    fn test_policy_object_keeps_extra_attributes() {
        let policy: PolicyObject =
            serde_json::from_value(json!({"id": "7", "name": "Dine in", "tax_ids": [1, 2]}))
                .unwrap();
        assert_eq!(policy.key(), Some(HostKey::from(7)));
        assert_eq!(policy.extra.get("tax_ids"), Some(&json!([1, 2])));
        assert_eq!(policy.to_value()["tax_ids"], json!([1, 2]));
    }

    #[test]
    fn test_mapping_builder_skips_policies_without_id() {
        let catalog = PolicyCatalog::mapping(vec![
            PolicyObject::new(42, "Takeaway"),
            PolicyObject {
                id: Value::Null,
                name: None,
                extra: serde_json::Map::new(),
            },
        ]);
        assert_eq!(catalog.len(), 1);
    }
}
