// Copyright 2025 Cowboy AI, LLC.

//! # Takeaway Reconciler
//!
//! Keeps every order of one governed point-of-sale session classified as
//! takeaway and carrying the session's takeaway tax policy, even though the
//! host keeps resetting the policy behind the engine's back.
//!
//! The crate is organised in layers:
//! - **Host boundary** ([`host`]): traits for duck-typed host sessions and
//!   orders, plus an in-memory host for tests and demos
//! - **Domain** ([`domain`]): scope matching, policy resolution, capability
//!   probes, the idempotent corrector and the invariant check
//! - **Infrastructure** ([`infrastructure`]): the bracketing scheduler and
//!   the host event binding
//! - **Engine** ([`ReconciliationEngine`]): wires it all from an
//!   [`EngineConfig`]
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use takeaway_reconciler::{EngineConfig, HostEvent, ReconciliationEngine};
//!
//! # async fn run(events: tokio_stream::wrappers::UnboundedReceiverStream<HostEvent>)
//! #     -> takeaway_reconciler::ReconcileResult<()> {
//! let engine = Arc::new(ReconciliationEngine::new(EngineConfig::default())?);
//! let binding = engine.install(events)?;
//! binding.await.ok();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod domain;
mod engine;
mod errors;
mod event_handler;
mod events;
pub mod host;
mod identifiers;
pub mod infrastructure;
pub mod metrics;

pub use config::{EngineConfig, HostVocabulary, ScheduleConfig, ScopeConfig};
pub use domain::{
    CorrectionOutcome, InvariantCheckResult, InvariantViolation, LocationScope, MutatorStrategy,
    OrderCorrector, PolicyResolver, ReadStrategy, StepOutcome, TakeawayInvariant, TargetPolicy,
    ViolationSeverity,
};
pub use engine::ReconciliationEngine;
pub use errors::{HostError, ReconcileError, ReconcileResult};
pub use event_handler::EventHandler;
pub use events::{HostEvent, TriggerKind};
pub use host::{HostOrder, HostSession, PolicyCatalog, PolicyObject, SharedOrder};
pub use identifiers::{CorrectionRunId, HostKey, OrderKey};
pub use infrastructure::{EventBinding, ReconciliationScheduler, RunReport, ScheduledRun};
pub use metrics::{EngineMetrics, MetricsSnapshot};
