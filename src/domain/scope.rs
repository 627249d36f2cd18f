// Copyright 2025 Cowboy AI, LLC.

//! Location scoping
//!
//! Decides whether a session belongs to the governed service point. Pure and
//! total: a missing or malformed session is simply out of scope.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ScopeConfig;
use crate::errors::{ReconcileError, ReconcileResult};
use crate::host::HostSession;
use crate::identifiers::HostKey;

/// Predicate selecting the sessions this engine governs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationScope {
    /// Exact session identifier match
    SessionId(HostKey),
    /// Trimmed, case-insensitive display name match; stored normalized
    DisplayName(String),
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl LocationScope {
    /// Scope by session identifier
    pub fn session_id(id: impl Into<HostKey>) -> Self {
        LocationScope::SessionId(id.into())
    }

    /// Scope by display name
    pub fn display_name(name: impl AsRef<str>) -> Self {
        LocationScope::DisplayName(normalize_name(name.as_ref()))
    }

    /// Build from configuration
    pub fn from_config(config: &ScopeConfig) -> ReconcileResult<Self> {
        match config {
            ScopeConfig::SessionId { id } => HostKey::from_scalar(id)
                .map(LocationScope::SessionId)
                .ok_or_else(|| {
                    ReconcileError::configuration(format!("invalid scope session id: {id}"))
                }),
            ScopeConfig::DisplayName { name } => {
                let normalized = normalize_name(name);
                if normalized.is_empty() {
                    Err(ReconcileError::configuration("scope display name is blank"))
                } else {
                    Ok(LocationScope::DisplayName(normalized))
                }
            }
        }
    }

    /// Whether `session` is governed
    pub fn in_scope(&self, session: Option<&dyn HostSession>) -> bool {
        let Some(session) = session else {
            return false;
        };

        match self {
            LocationScope::SessionId(target) => session
                .session_id()
                .and_then(|raw| HostKey::from_scalar(&raw))
                .is_some_and(|id| &id == target),
            LocationScope::DisplayName(target) => session
                .display_name()
                .is_some_and(|name| &normalize_name(&name) == target),
        }
    }
}

impl fmt::Display for LocationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationScope::SessionId(id) => write!(f, "session id {id}"),
            LocationScope::DisplayName(name) => write!(f, "session named '{name}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MemorySession;
    use serde_json::{json, Value};
    use test_case::test_case;

    #[test_case("Piso 1" ; "exact")]
    #[test_case("  piso 1 " ; "padded lowercase")]
    #[test_case("PISO 1" ; "uppercase")]
    fn test_display_name_matches(name: &str) {
        let scope = LocationScope::display_name("Piso 1");
        let session = MemorySession::new().with_name(name).build();
        assert!(scope.in_scope(Some(session.as_ref())));
    }

    #[test]
    fn test_display_name_mismatch() {
        let scope = LocationScope::display_name("Piso 1");
        let session = MemorySession::new().with_name("Piso 2").build();
        assert!(!scope.in_scope(Some(session.as_ref())));
    }

    #[test_case(json!(1) ; "number")]
    #[test_case(json!("1") ; "string")]
    fn test_session_id_matches(id: Value) {
        let scope = LocationScope::session_id(1);
        let session = MemorySession::new().with_id(id).build();
        assert!(scope.in_scope(Some(session.as_ref())));
    }

    #[test_case(json!(2) ; "other id")]
    #[test_case(json!({"id": 1}) ; "object id")]
    #[test_case(json!(null) ; "null id")]
    fn test_session_id_rejects(id: Value) {
        let scope = LocationScope::session_id(1);
        let session = MemorySession::new().with_id(id).build();
        assert!(!scope.in_scope(Some(session.as_ref())));
    }

    #[test]
    fn test_absent_session_is_out_of_scope() {
        assert!(!LocationScope::display_name("Piso 1").in_scope(None));
        assert!(!LocationScope::session_id(1).in_scope(None));

        let nameless = MemorySession::new().build();
        assert!(!LocationScope::display_name("Piso 1").in_scope(Some(nameless.as_ref())));
    }

    #[test]
    fn test_strategy_is_not_mixed() {
        // id scoping ignores a matching name and vice versa
        let session = MemorySession::new().with_id(9).with_name("Piso 1").build();
        assert!(!LocationScope::session_id(1).in_scope(Some(session.as_ref())));
        assert!(LocationScope::display_name("piso 1").in_scope(Some(session.as_ref())));
    }

    #[test]
    fn test_from_config() {
        let scope = LocationScope::from_config(&ScopeConfig::SessionId { id: json!("7") }).unwrap();
        assert_eq!(scope, LocationScope::session_id(7));

        let scope = LocationScope::from_config(&ScopeConfig::default()).unwrap();
        assert_eq!(scope, LocationScope::DisplayName("piso 1".to_string()));

        assert!(LocationScope::from_config(&ScopeConfig::SessionId { id: json!([]) }).is_err());
    }
}
