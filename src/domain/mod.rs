// Copyright 2025 Cowboy AI, LLC.

//! The takeaway invariant and the pieces that enforce it
//!
//! Leaf-first: [`LocationScope`] decides which sessions are governed,
//! [`PolicyResolver`] finds the desired policy in session configuration,
//! [`capability`] probes the host order for the mutators it exposes, and
//! [`OrderCorrector`] combines them into one idempotent correction.

pub mod capability;
pub mod corrector;
pub mod invariants;
pub mod resolver;
pub mod scope;

pub use capability::{MutatorStrategy, ReadStrategy};
pub use corrector::{CorrectionOutcome, OrderCorrector, StepOutcome};
pub use invariants::{
    InvariantCheckResult, InvariantViolation, TakeawayInvariant, ViolationSeverity,
};
pub use resolver::{PolicyResolver, TargetPolicy};
pub use scope::LocationScope;
