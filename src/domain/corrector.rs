// Copyright 2025 Cowboy AI, LLC.

//! Order correction
//!
//! One correction drives a governed order to the takeaway invariant:
//!
//! 1. out-of-scope session or missing order: no-op
//! 2. set the takeaway flag
//! 3. assign the resolved takeaway policy, when configuration names one
//! 4. invoke every recompute operation the order exposes, then notify once
//!
//! Each step is guarded on its own. A failing step is logged and recorded in
//! the [`CorrectionOutcome`]; it never stops the following steps and never
//! reaches the caller.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::HostVocabulary;
use crate::domain::capability::{
    apply_setter, probe_all, probe_getter, probe_setter, read_flag,
};
use crate::domain::invariants::TakeawayInvariant;
use crate::domain::resolver::{policy_key_of, PolicyResolver, TargetPolicy};
use crate::domain::scope::LocationScope;
use crate::host::{HostOrder, HostSession};
use crate::identifiers::HostKey;

/// Result of one correction step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Step ran; carries the strategy used
    Applied(String),
    /// Nothing to do (e.g. no policy configured)
    Skipped(String),
    /// The order exposes nothing this step can use
    Unavailable,
    /// The host raised
    Failed(String),
    /// The correction stopped before this step
    NotAttempted,
}

impl StepOutcome {
    /// Whether the step ran without error
    pub fn is_applied(&self) -> bool {
        matches!(self, StepOutcome::Applied(_))
    }

    /// Whether the step hit a host failure
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// What one call to [`OrderCorrector::correct_with_outcome`] did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionOutcome {
    /// Classification was attempted
    pub applied: bool,
    /// Step 2
    pub classification: StepOutcome,
    /// Step 3
    pub policy: StepOutcome,
    /// Step 4, recompute operations
    pub recompute: StepOutcome,
    /// Step 4, change notification
    pub notification: StepOutcome,
    /// Identifier of the policy the order was driven to
    pub target_policy: Option<HostKey>,
}

impl CorrectionOutcome {
    fn not_attempted() -> Self {
        Self {
            applied: false,
            classification: StepOutcome::NotAttempted,
            policy: StepOutcome::NotAttempted,
            recompute: StepOutcome::NotAttempted,
            notification: StepOutcome::NotAttempted,
            target_policy: None,
        }
    }

    /// Correction ran but no policy could be resolved
    pub fn is_classification_only(&self) -> bool {
        self.applied && matches!(self.policy, StepOutcome::Skipped(_))
    }

    /// Number of steps that hit a host failure
    pub fn failed_steps(&self) -> usize {
        [
            &self.classification,
            &self.policy,
            &self.recompute,
            &self.notification,
        ]
        .into_iter()
        .filter(|s| s.is_failed())
        .count()
    }
}

/// Drives one order to the takeaway invariant
#[derive(Debug, Clone)]
pub struct OrderCorrector {
    scope: LocationScope,
    resolver: PolicyResolver,
    vocabulary: HostVocabulary,
}

impl OrderCorrector {
    /// Create a corrector
    pub fn new(scope: LocationScope, vocabulary: HostVocabulary) -> Self {
        Self {
            resolver: PolicyResolver::from_vocabulary(&vocabulary),
            scope,
            vocabulary,
        }
    }

    /// The scoping predicate
    pub fn scope(&self) -> &LocationScope {
        &self.scope
    }

    /// The policy resolver
    pub fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }

    /// The host vocabulary
    pub fn vocabulary(&self) -> &HostVocabulary {
        &self.vocabulary
    }

    /// Invariant check bound to this corrector's configuration
    pub fn invariant(&self) -> TakeawayInvariant<'_> {
        TakeawayInvariant::new(self)
    }

    /// Correct `order`; `true` once classification was attempted
    pub fn correct(
        &self,
        session: Option<&dyn HostSession>,
        order: Option<&mut dyn HostOrder>,
    ) -> bool {
        self.correct_with_outcome(session, order).applied
    }

    /// Correct `order` and report what each step did
    pub fn correct_with_outcome(
        &self,
        session: Option<&dyn HostSession>,
        order: Option<&mut dyn HostOrder>,
    ) -> CorrectionOutcome {
        let (Some(session), Some(order)) = (session, order) else {
            return CorrectionOutcome::not_attempted();
        };
        if !self.scope.in_scope(Some(session)) {
            return CorrectionOutcome::not_attempted();
        }

        let order_key = order.key();
        let classification = self.classify(order);

        let target = self.resolver.resolve(session);
        let policy = match &target {
            Some(target) => self.assign_policy(order, target),
            None => {
                warn!(
                    order = %order_key,
                    aliases = ?self.resolver.aliases(),
                    "No takeaway policy configured for session; applying classification only"
                );
                StepOutcome::Skipped("no takeaway policy configured".to_string())
            }
        };

        let recompute = self.recompute(order);
        let notification = self.notify(order);

        debug!(
            order = %order_key,
            classification = ?classification,
            policy = ?policy,
            recompute = ?recompute,
            "Correction applied"
        );

        CorrectionOutcome {
            applied: true,
            classification,
            policy,
            recompute,
            notification,
            target_policy: target.and_then(|t| t.key()),
        }
    }

    /// Whether the order currently reads as takeaway
    pub fn is_classified(&self, order: &mut dyn HostOrder) -> bool {
        let strategy = probe_getter(
            order,
            &self.vocabulary.takeaway_getters,
            &self.vocabulary.takeaway_fields,
        );
        read_flag(order, &strategy)
    }

    /// Identifier of the policy currently on the order
    pub fn current_policy(&self, order: &dyn HostOrder) -> Option<HostKey> {
        self.current_policy_value(order)
            .and_then(|value| policy_key_of(&value))
    }

    fn current_policy_value(&self, order: &dyn HostOrder) -> Option<Value> {
        self.vocabulary
            .policy_fields
            .iter()
            .filter_map(|field| order.read_field(field))
            .find(|value| policy_key_of(value).is_some())
    }

    fn classify(&self, order: &mut dyn HostOrder) -> StepOutcome {
        let strategy = probe_setter(
            order,
            &self.vocabulary.takeaway_setters,
            &self.vocabulary.takeaway_fields,
        );
        match apply_setter(order, &strategy, &Value::Bool(true)) {
            Ok(()) => StepOutcome::Applied(strategy.label()),
            Err(err) => {
                warn!(
                    order = %order.key(),
                    strategy = %strategy.label(),
                    error = %err,
                    "Could not set takeaway flag"
                );
                StepOutcome::Failed(err.to_string())
            }
        }
    }

    fn assign_policy(&self, order: &mut dyn HostOrder, target: &TargetPolicy) -> StepOutcome {
        if !target.is_object() {
            debug!(order = %order.key(), "Takeaway policy not in catalog; assigning bare id");
        }
        let strategy = probe_setter(
            order,
            &self.vocabulary.policy_setters,
            &self.vocabulary.policy_fields,
        );
        // An order already on the target keeps its own encoding of it.
        let value = self
            .current_policy_value(order)
            .filter(|current| target.key().is_some() && policy_key_of(current) == target.key())
            .unwrap_or_else(|| target.to_value());
        match apply_setter(order, &strategy, &value) {
            Ok(()) => StepOutcome::Applied(strategy.label()),
            Err(err) => {
                warn!(
                    order = %order.key(),
                    strategy = %strategy.label(),
                    error = %err,
                    "Could not set takeaway policy"
                );
                StepOutcome::Failed(err.to_string())
            }
        }
    }

    fn recompute(&self, order: &mut dyn HostOrder) -> StepOutcome {
        let operations = probe_all(order, &self.vocabulary.recompute_operations);
        if operations.is_empty() {
            warn!(
                order = %order.key(),
                candidates = ?self.vocabulary.recompute_operations,
                "Order exposes no recompute operation"
            );
            return StepOutcome::Unavailable;
        }

        let mut failures = Vec::new();
        for operation in &operations {
            if let Err(err) = order.invoke(operation, &[]) {
                warn!(
                    order = %order.key(),
                    operation = %operation,
                    error = %err,
                    "Recompute failed"
                );
                failures.push(err.to_string());
            }
        }

        if failures.is_empty() {
            StepOutcome::Applied(operations.join(","))
        } else {
            StepOutcome::Failed(failures.join("; "))
        }
    }

    fn notify(&self, order: &mut dyn HostOrder) -> StepOutcome {
        let Some(notifier) = self.vocabulary.change_notifier.as_deref() else {
            return StepOutcome::Unavailable;
        };
        if !order.responds_to(notifier) {
            return StepOutcome::Unavailable;
        }
        match order.invoke(notifier, &[Value::String(self.vocabulary.change_event.clone())]) {
            Ok(_) => StepOutcome::Applied(notifier.to_string()),
            Err(err) => {
                warn!(order = %order.key(), error = %err, "Change notification failed");
                StepOutcome::Failed(err.to_string())
            }
        }
    }
}
