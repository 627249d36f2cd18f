//! The takeaway invariant
//!
//! For every order whose session is in scope: the takeaway flag is set and
//! the order carries the session's configured takeaway policy. Checking is
//! read-only; correcting is the [`OrderCorrector`]'s job.

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::corrector::OrderCorrector;
use crate::host::{HostOrder, HostSession};

/// Result of checking the invariant on one order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckResult {
    /// Whether the invariant holds
    pub satisfied: bool,

    /// Violations found (if any)
    pub violations: Vec<InvariantViolation>,

    /// Timestamp of the check
    pub checked_at: DateTime<Utc>,

    /// Additional context
    pub context: HashMap<String, String>,
}

/// A violation of the invariant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant_name: String,

    /// Order the violation was found on
    pub order: String,

    /// Description of the violation
    pub message: String,

    /// Severity of the violation
    pub severity: ViolationSeverity,

    /// Suggested remediation
    pub remediation: Option<String>,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViolationSeverity {
    /// Informational - not critical
    Info,

    /// Warning - should be addressed
    Warning,

    /// Error - the invariant does not hold
    Error,
}

/// Checks the takeaway invariant using a corrector's configuration
pub struct TakeawayInvariant<'a> {
    corrector: &'a OrderCorrector,
}

impl<'a> TakeawayInvariant<'a> {
    /// Name used in violations
    pub const NAME: &'static str = "takeaway_order";

    /// Bind to a corrector
    pub fn new(corrector: &'a OrderCorrector) -> Self {
        Self { corrector }
    }

    /// Check `order` against the invariant
    pub fn check(
        &self,
        session: &dyn HostSession,
        order: &mut dyn HostOrder,
    ) -> InvariantCheckResult {
        let mut context = HashMap::new();
        context.insert("order".to_string(), order.key().to_string());

        if !self.corrector.scope().in_scope(Some(session)) {
            context.insert("governed".to_string(), "false".to_string());
            return InvariantCheckResult {
                satisfied: true,
                violations: Vec::new(),
                checked_at: Utc::now(),
                context,
            };
        }
        context.insert("governed".to_string(), "true".to_string());

        let order_key = order.key().to_string();
        let violation = |message: String, severity: ViolationSeverity, remediation: &str| {
            InvariantViolation {
                invariant_name: Self::NAME.to_string(),
                order: order_key.clone(),
                message,
                severity,
                remediation: Some(remediation.to_string()),
            }
        };

        let mut violations = Vec::new();
        if !self.corrector.is_classified(order) {
            violations.push(violation(
                "order is not classified as takeaway".to_string(),
                ViolationSeverity::Error,
                "run a correction",
            ));
        }

        let current = self.corrector.current_policy(order);
        match self.corrector.resolver().resolve_takeaway_policy_id(session) {
            Some(target) => {
                if current.as_ref() != Some(&target) {
                    let found = current.map(|c| c.to_string());
                    violations.push(violation(
                        format!(
                            "order policy is {} instead of {target}",
                            found.as_deref().unwrap_or("unset")
                        ),
                        ViolationSeverity::Error,
                        "run a correction",
                    ));
                }
                context.insert("target_policy".to_string(), target.to_string());
            }
            None => violations.push(violation(
                "session has no takeaway policy configured".to_string(),
                ViolationSeverity::Warning,
                "set one of the takeaway policy aliases",
            )),
        }

        InvariantCheckResult {
            satisfied: violations.iter().all(|v| v.severity < ViolationSeverity::Error),
            violations,
            checked_at: Utc::now(),
            context,
        }
    }
}
