// Copyright 2025 Cowboy AI, LLC.

//! Engine configuration
//!
//! Everything the engine needs is injected at construction through
//! [`EngineConfig`]: which session is governed, when corrections fire, and the
//! names the host build uses for each semantic action.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::errors::{ReconcileError, ReconcileResult};

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    /// Which session the engine governs
    pub scope: ScopeConfig,

    /// Correction offsets
    pub schedule: ScheduleConfig,

    /// Host operation and field names
    pub vocabulary: HostVocabulary,

    /// Most orders remembered as enrolled; the least recently scheduled is evicted first
    pub enrollment_capacity: usize,
}

/// Default bound on the enrollment table
pub const DEFAULT_ENROLLMENT_CAPACITY: usize = 4096;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scope: ScopeConfig::default(),
            schedule: ScheduleConfig::default(),
            vocabulary: HostVocabulary::default(),
            enrollment_capacity: DEFAULT_ENROLLMENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(raw: &str) -> ReconcileResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.enrollment_capacity == 0 {
            return Err(ReconcileError::configuration(
                "enrollment capacity must be at least 1",
            ));
        }
        self.scope.validate()?;
        self.schedule.validate()?;
        self.vocabulary.validate()
    }

    /// JSON schema of the configuration document
    pub fn json_schema() -> Value {
        serde_json::to_value(schemars::schema_for!(EngineConfig)).unwrap_or(Value::Null)
    }
}

/// Scoping strategy; exactly one is active per deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ScopeConfig {
    /// Match the session identifier exactly
    SessionId {
        /// Identifier as number or string
        id: Value,
    },
    /// Match the trimmed, case-insensitive display name
    DisplayName {
        /// Target display name
        name: String,
    },
}

impl Default for ScopeConfig {
    fn default() -> Self {
        ScopeConfig::DisplayName {
            name: "Piso 1".to_string(),
        }
    }
}

impl ScopeConfig {
    fn validate(&self) -> ReconcileResult<()> {
        match self {
            ScopeConfig::SessionId { id } => match id {
                Value::Number(_) => Ok(()),
                Value::String(s) if !s.trim().is_empty() => Ok(()),
                other => Err(ReconcileError::configuration(format!(
                    "scope session id must be a number or non-empty string, got {other}"
                ))),
            },
            ScopeConfig::DisplayName { name } if name.trim().is_empty() => Err(
                ReconcileError::configuration("scope display name must not be blank"),
            ),
            ScopeConfig::DisplayName { .. } => Ok(()),
        }
    }
}

/// When corrections fire after a trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Delays after the immediate correction, in milliseconds
    pub offsets_ms: Vec<u64>,

    /// Extra delays used only for customer assignment, in milliseconds
    pub customer_tail_ms: Vec<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            offsets_ms: vec![50, 120, 300],
            customer_tail_ms: vec![800],
        }
    }
}

impl ScheduleConfig {
    /// Regular offsets as durations
    pub fn offsets(&self) -> Vec<Duration> {
        self.offsets_ms.iter().map(|ms| Duration::from_millis(*ms)).collect()
    }

    /// Customer tail offsets as durations
    pub fn customer_tail(&self) -> Vec<Duration> {
        self.customer_tail_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }

    fn validate(&self) -> ReconcileResult<()> {
        let ascending = |offsets: &[u64]| offsets.windows(2).all(|w| w[0] < w[1]);
        if !ascending(&self.offsets_ms) {
            return Err(ReconcileError::configuration(
                "schedule offsets must be strictly ascending",
            ));
        }
        if !ascending(&self.customer_tail_ms) {
            return Err(ReconcileError::configuration(
                "customer tail offsets must be strictly ascending",
            ));
        }
        if let (Some(last), Some(first_tail)) =
            (self.offsets_ms.last(), self.customer_tail_ms.first())
        {
            if first_tail <= last {
                return Err(ReconcileError::configuration(
                    "customer tail must start after the last regular offset",
                ));
            }
        }
        Ok(())
    }
}

/// Names the host build uses for each semantic action, in priority order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HostVocabulary {
    /// Session configuration fields holding the takeaway policy
    pub policy_config_aliases: Vec<String>,

    /// Order methods that set the takeaway flag
    pub takeaway_setters: Vec<String>,

    /// Order methods that read the takeaway flag
    pub takeaway_getters: Vec<String>,

    /// Order fields written when no setter exists
    pub takeaway_fields: Vec<String>,

    /// Order methods that set the policy
    pub policy_setters: Vec<String>,

    /// Order fields written when no policy setter exists
    pub policy_fields: Vec<String>,

    /// Recompute operations; every one present is invoked
    pub recompute_operations: Vec<String>,

    /// Generic change-notification method
    pub change_notifier: Option<String>,

    /// Event name passed to the change notifier
    pub change_event: String,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for HostVocabulary {
    fn default() -> Self {
        Self {
            policy_config_aliases: names(&[
                "takeaway_fiscal_position_id",
                "takeawayFiscalPositionId",
                "takeaway_fiscal_position",
                "takeawayPolicyId",
            ]),
            takeaway_setters: names(&["set_is_takeaway", "setIsTakeaway"]),
            takeaway_getters: names(&["get_is_takeaway", "getIsTakeaway"]),
            takeaway_fields: names(&["is_takeaway", "isTakeaway"]),
            policy_setters: names(&["set_fiscal_position", "setFiscalPosition"]),
            policy_fields: names(&["fiscal_position", "fiscalPosition"]),
            recompute_operations: names(&["recomputeTaxes", "recompute_tax", "_recomputeTaxes"]),
            change_notifier: Some("trigger".to_string()),
            change_event: "change".to_string(),
        }
    }
}

impl HostVocabulary {
    fn validate(&self) -> ReconcileResult<()> {
        if self.policy_config_aliases.is_empty() {
            return Err(ReconcileError::configuration(
                "at least one policy config alias is required",
            ));
        }
        if self.takeaway_fields.is_empty() || self.policy_fields.is_empty() {
            return Err(ReconcileError::configuration(
                "field fallbacks must name at least one field",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vocabulary.policy_config_aliases.len(), 4);
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "scope": { "strategy": "session_id", "id": 3 },
                 "schedule": { "offsets_ms": [10, 20] } }"#,
        )
        .unwrap();

        assert_eq!(config.scope, ScopeConfig::SessionId { id: Value::from(3) });
        assert_eq!(config.schedule.offsets_ms, vec![10, 20]);
        assert_eq!(config.schedule.customer_tail_ms, vec![800]);
        assert_eq!(config.vocabulary, HostVocabulary::default());
    }

    #[test]
    fn test_zero_enrollment_capacity_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "enrollment_capacity": 0 }"#).unwrap_err();
        assert!(err.is_configuration_error());
        assert_eq!(EngineConfig::default().enrollment_capacity, DEFAULT_ENROLLMENT_CAPACITY);
    }

    #[test]
    fn test_unsorted_offsets_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "schedule": { "offsets_ms": [300, 50] } }"#)
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_tail_must_follow_offsets() {
        let err = EngineConfig::from_json_str(
            r#"{ "schedule": { "offsets_ms": [50, 900], "customer_tail_ms": [800] } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("customer tail"));
    }

    #[test]
    fn test_blank_scope_rejected() {
        let err =
            EngineConfig::from_json_str(
                r#"{ "scope": { "strategy": "display_name", "name": " " } }"#,
            )
                .unwrap_err();
        assert!(err.is_configuration_error());

        let err =
            EngineConfig::from_json_str(r#"{ "scope": { "strategy": "session_id", "id": null } }"#)
                .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_schema_names_sections() {
        let schema = EngineConfig::json_schema();
        let properties = &schema["properties"];
        assert!(properties.get("scope").is_some());
        assert!(properties.get("schedule").is_some());
        assert!(properties.get("vocabulary").is_some());
    }
}
