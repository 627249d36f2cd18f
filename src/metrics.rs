// Copyright 2025 Cowboy AI, LLC.

//! Counters for reconciliation activity

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::CorrectionOutcome;

/// Correction runs scheduled
pub const RUNS_SCHEDULED: &str = "runs_scheduled";
/// Individual corrections executed
pub const CORRECTIONS: &str = "corrections";
/// Corrections that found no policy to assign
pub const CLASSIFICATION_ONLY: &str = "classification_only";
/// Correction steps that hit a host failure
pub const FAILED_STEPS: &str = "failed_steps";
/// Policy-change events ignored by the loop guard
pub const SKIPPED_RETRIGGERS: &str = "skipped_retriggers";
/// Runs whose final correction left the invariant violated
pub const UNCONVERGED_RUNS: &str = "unconverged_runs";

/// Metrics shared by the scheduler and the event binding
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    counters: Arc<RwLock<HashMap<String, u64>>>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Correction runs scheduled
    pub runs_scheduled: u64,
    /// Corrections executed
    pub corrections: u64,
    /// Corrections without a resolvable policy
    pub classification_only: u64,
    /// Failed correction steps
    pub failed_steps: u64,
    /// Policy-change re-triggers skipped
    pub skipped_retriggers: u64,
    /// Runs that ended unconverged
    pub unconverged_runs: u64,
}

impl EngineMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            counters: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Increment a counter
    pub async fn increment(&self, name: &str) {
        self.add(name, 1).await;
    }

    /// Add to a counter
    pub async fn add(&self, name: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        let mut counters = self.counters.write().await;
        *counters.entry(name.to_string()).or_insert(0) += amount;
    }

    /// Get counter value
    pub async fn get_counter(&self, name: &str) -> u64 {
        let counters = self.counters.read().await;
        counters.get(name).copied().unwrap_or(0)
    }

    /// Record what one correction did
    pub async fn record_outcome(&self, outcome: &CorrectionOutcome) {
        if !outcome.applied {
            return;
        }
        let mut counters = self.counters.write().await;
        *counters.entry(CORRECTIONS.to_string()).or_insert(0) += 1;
        if outcome.is_classification_only() {
            *counters.entry(CLASSIFICATION_ONLY.to_string()).or_insert(0) += 1;
        }
        let failed = outcome.failed_steps() as u64;
        if failed > 0 {
            *counters.entry(FAILED_STEPS.to_string()).or_insert(0) += failed;
        }
    }

    /// Copy all counters
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.counters.read().await;
        let get = |name: &str| counters.get(name).copied().unwrap_or(0);
        MetricsSnapshot {
            runs_scheduled: get(RUNS_SCHEDULED),
            corrections: get(CORRECTIONS),
            classification_only: get(CLASSIFICATION_ONLY),
            failed_steps: get(FAILED_STEPS),
            skipped_retriggers: get(SKIPPED_RETRIGGERS),
            unconverged_runs: get(UNCONVERGED_RUNS),
        }
    }
}
