// Copyright 2025 Cowboy AI, LLC.

//! Runtime plumbing around the correction core
//!
//! The scheduler turns one trigger into a run of timed corrections; the
//! binding turns host events into triggers.

pub mod binding;
pub mod scheduler;

pub use binding::EventBinding;
pub use scheduler::{ReconciliationScheduler, RunReport, ScheduledRun};
