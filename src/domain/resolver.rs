// Copyright 2025 Cowboy AI, LLC.

//! Takeaway policy resolution
//!
//! Session configuration names the takeaway policy under one of several
//! field aliases depending on the host build, and encodes it as a scalar id,
//! an `[id, label]` pair, or an object carrying `id`. The resolver reduces
//! all of that to a [`HostKey`] and then to a catalog entry when one exists.

use serde_json::Value;
use tracing::debug;

use crate::config::HostVocabulary;
use crate::host::{HostSession, PolicyCatalog, PolicyObject};
use crate::identifiers::HostKey;

/// Reduce a host policy reference to its identifier
///
/// Accepts a scalar, an `[id, label]` pair (first element wins) or an object
/// with an `id` field.
pub fn policy_key_of(value: &Value) -> Option<HostKey> {
    match value {
        Value::Array(pair) => pair.first().and_then(HostKey::from_scalar),
        Value::Object(obj) => obj.get("id").and_then(HostKey::from_scalar),
        scalar => HostKey::from_scalar(scalar),
    }
}

/// Unset many2one-style values the host leaves in place of a real reference
fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Number(n) => n.as_i64() == Some(0),
        _ => false,
    }
}

/// The policy an order should carry
#[derive(Debug, Clone, PartialEq)]
pub enum TargetPolicy {
    /// Catalog entry found
    Object(PolicyObject),
    /// Only the identifier is known
    Id(HostKey),
}

impl TargetPolicy {
    /// Identifier of the target
    pub fn key(&self) -> Option<HostKey> {
        match self {
            TargetPolicy::Object(policy) => policy.key(),
            TargetPolicy::Id(key) => Some(key.clone()),
        }
    }

    /// Value handed to the host; the object when available
    pub fn to_value(&self) -> Value {
        match self {
            TargetPolicy::Object(policy) => policy.to_value(),
            TargetPolicy::Id(key) => key.to_value(),
        }
    }

    /// Whether the catalog entry was found
    pub fn is_object(&self) -> bool {
        matches!(self, TargetPolicy::Object(_))
    }
}

/// Resolves the configured takeaway policy of a session
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyResolver {
    aliases: Vec<String>,
}

impl PolicyResolver {
    /// Create a resolver trying `aliases` in order
    pub fn new(aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            aliases: aliases.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a resolver from a host vocabulary
    pub fn from_vocabulary(vocabulary: &HostVocabulary) -> Self {
        Self::new(vocabulary.policy_config_aliases.iter().cloned())
    }

    /// Configuration aliases in priority order
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Identifier of the configured takeaway policy
    ///
    /// Aliases holding an unset value are skipped; so are values that do not
    /// decode to an identifier.
    pub fn resolve_takeaway_policy_id(&self, session: &dyn HostSession) -> Option<HostKey> {
        for alias in &self.aliases {
            let Some(raw) = session.config_field(alias) else {
                continue;
            };
            if is_unset(&raw) {
                continue;
            }
            match policy_key_of(&raw) {
                Some(key) => {
                    debug!(alias = %alias, policy = %key, "Resolved takeaway policy id");
                    return Some(key);
                }
                None => debug!(alias = %alias, value = %raw, "Ignoring undecodable policy alias"),
            }
        }
        None
    }

    /// Catalog entry for `id`
    ///
    /// A mapping catalog is consulted by key first and scanned afterwards, so
    /// entries stored under a non-canonical key are still found.
    pub fn resolve_policy_object(
        &self,
        session: &dyn HostSession,
        id: &HostKey,
    ) -> Option<PolicyObject> {
        let matches = |policy: &&PolicyObject| policy.key().as_ref() == Some(id);

        match session.policy_catalog()? {
            PolicyCatalog::Mapping(map) => map
                .get(id.as_str())
                .or_else(|| map.values().find(matches))
                .cloned(),
            PolicyCatalog::Ordered(list) => list.iter().find(matches).cloned(),
        }
    }

    /// Full resolution: id first, then the catalog object when present
    pub fn resolve(&self, session: &dyn HostSession) -> Option<TargetPolicy> {
        let id = self.resolve_takeaway_policy_id(session)?;
        Some(match self.resolve_policy_object(session, &id) {
            Some(policy) => TargetPolicy::Object(policy),
            None => TargetPolicy::Id(id),
        })
    }
}

impl Default for PolicyResolver {
    fn default() -> Self {
        Self::from_vocabulary(&HostVocabulary::default())
    }
}
