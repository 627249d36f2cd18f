// Copyright 2025 Cowboy AI, LLC.

//! Reconciliation scheduling
//!
//! The host resets an order's policy asynchronously after some triggers, at
//! an offset this crate does not know. Rather than guess it, every trigger
//! starts a run that corrects once right away and again at a fixed set of
//! offsets bracketing the race window. Runs are never cancelled: corrections
//! are idempotent, so overlapping runs for the same order only cost a few
//! redundant writes.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info_span, warn, Instrument};

use crate::config::ScheduleConfig;
use crate::domain::OrderCorrector;
use crate::events::TriggerKind;
use crate::host::{HostSession, SharedOrder};
use crate::identifiers::CorrectionRunId;
use crate::metrics::{EngineMetrics, RUNS_SCHEDULED, UNCONVERGED_RUNS};

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Run identifier
    pub run_id: CorrectionRunId,
    /// What started the run
    pub trigger: TriggerKind,
    /// Corrections that were executed
    pub corrections: usize,
    /// Whether the invariant held after the last correction
    pub converged: bool,
}

enum RunState {
    Spawned(JoinHandle<RunReport>),
    Completed(RunReport),
}

/// Handle to a scheduled run
///
/// Dropping it does not cancel anything.
pub struct ScheduledRun {
    run_id: CorrectionRunId,
    planned: usize,
    state: RunState,
}

impl ScheduledRun {
    /// Run identifier
    pub fn run_id(&self) -> CorrectionRunId {
        self.run_id
    }

    /// Corrections the run will execute, the immediate one included
    pub fn planned_corrections(&self) -> usize {
        self.planned
    }

    /// Wait for the last correction of the run
    ///
    /// Returns `None` if the run task panicked or was aborted by runtime shutdown.
    pub async fn finished(self) -> Option<RunReport> {
        match self.state {
            RunState::Spawned(handle) => handle.await.ok(),
            RunState::Completed(report) => Some(report),
        }
    }
}

/// Schedules bracketing corrections after each trigger
#[derive(Clone)]
pub struct ReconciliationScheduler {
    corrector: Arc<OrderCorrector>,
    config: ScheduleConfig,
    metrics: EngineMetrics,
}

impl ReconciliationScheduler {
    /// Create a scheduler
    pub fn new(
        corrector: Arc<OrderCorrector>,
        config: ScheduleConfig,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            corrector,
            config,
            metrics,
        }
    }

    /// Delays, measured from the trigger, of the corrections after the immediate one
    pub fn offsets_for(&self, trigger: TriggerKind) -> Vec<Duration> {
        let mut offsets = self.config.offsets();
        if trigger.races_policy_reset() {
            offsets.extend(self.config.customer_tail());
        }
        offsets
    }

    /// Correct `order` now and at every offset for `trigger`
    ///
    /// Needs a tokio runtime to defer work; without one a single correction
    /// runs inline when the order is not locked elsewhere.
    pub fn schedule(
        &self,
        session: Arc<dyn HostSession>,
        order: SharedOrder,
        trigger: TriggerKind,
    ) -> ScheduledRun {
        let run_id = CorrectionRunId::new();
        let offsets = self.offsets_for(trigger);
        let planned = offsets.len() + 1;

        let state = match Handle::try_current() {
            Ok(runtime) => {
                let span = info_span!("reconcile", run_id = %run_id, trigger = %trigger);
                let task = run_corrections(
                    Arc::clone(&self.corrector),
                    self.metrics.clone(),
                    session,
                    order,
                    offsets,
                    run_id,
                    trigger,
                );
                RunState::Spawned(runtime.spawn(task.instrument(span)))
            }
            Err(_) => {
                warn!(
                    run_id = %run_id,
                    trigger = %trigger,
                    "No async runtime; correcting inline once"
                );
                RunState::Completed(self.correct_inline(session, order, run_id, trigger))
            }
        };

        ScheduledRun {
            run_id,
            planned,
            state,
        }
    }

    fn correct_inline(
        &self,
        session: Arc<dyn HostSession>,
        order: SharedOrder,
        run_id: CorrectionRunId,
        trigger: TriggerKind,
    ) -> RunReport {
        let mut report = RunReport {
            run_id,
            trigger,
            corrections: 0,
            converged: false,
        };
        let Ok(mut guard) = order.try_lock() else {
            warn!(run_id = %run_id, "Order is locked; inline correction skipped");
            return report;
        };

        let outcome = self
            .corrector
            .correct_with_outcome(Some(session.as_ref()), Some(&mut *guard));
        report.corrections = 1;
        report.converged = self
            .corrector
            .invariant()
            .check(session.as_ref(), &mut *guard)
            .satisfied;
        drop(guard);

        futures::executor::block_on(async {
            self.metrics.increment(RUNS_SCHEDULED).await;
            self.metrics.record_outcome(&outcome).await;
        });
        report
    }
}

async fn run_corrections(
    corrector: Arc<OrderCorrector>,
    metrics: EngineMetrics,
    session: Arc<dyn HostSession>,
    order: SharedOrder,
    offsets: Vec<Duration>,
    run_id: CorrectionRunId,
    trigger: TriggerKind,
) -> RunReport {
    let started = Instant::now();
    metrics.increment(RUNS_SCHEDULED).await;

    let mut corrections = 0usize;
    correct_once(&corrector, &metrics, session.as_ref(), &order).await;
    corrections += 1;

    for offset in offsets {
        sleep_until(started + offset).await;
        correct_once(&corrector, &metrics, session.as_ref(), &order).await;
        corrections += 1;
    }

    let check = {
        let mut guard = order.lock().await;
        corrector.invariant().check(session.as_ref(), &mut *guard)
    };
    if check.satisfied {
        debug!(corrections, "Run finished; invariant holds");
    } else {
        warn!(
            corrections,
            violations = ?check.violations.iter().map(|v| v.message.as_str()).collect::<Vec<_>>(),
            "Run finished with the invariant still violated"
        );
        metrics.increment(UNCONVERGED_RUNS).await;
    }

    RunReport {
        run_id,
        trigger,
        corrections,
        converged: check.satisfied,
    }
}

async fn correct_once(
    corrector: &OrderCorrector,
    metrics: &EngineMetrics,
    session: &dyn HostSession,
    order: &SharedOrder,
) {
    let outcome = {
        let mut guard = order.lock().await;
        corrector.correct_with_outcome(Some(session), Some(&mut *guard))
    };
    metrics.record_outcome(&outcome).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostVocabulary;
    use crate::domain::LocationScope;
    use crate::host::memory::{MemoryOrder, MemorySession};
    use crate::host::{PolicyCatalog, PolicyObject};
    use crate::identifiers::HostKey;

    fn scheduler() -> ReconciliationScheduler {
        let corrector =
            OrderCorrector::new(LocationScope::display_name("Piso 1"), HostVocabulary::default());
        ReconciliationScheduler::new(
            Arc::new(corrector),
            ScheduleConfig::default(),
            EngineMetrics::new(),
        )
    }

    fn session() -> Arc<MemorySession> {
        MemorySession::new()
            .with_name("Piso 1")
            .with_config("takeawayPolicyId", 42)
            .with_catalog(PolicyCatalog::mapping(vec![PolicyObject::new(42, "Takeaway")]))
            .build()
    }

    #[test]
    fn test_customer_assignment_gets_tail() {
        let s = scheduler();
        let ms = |v: &[u64]| v.iter().map(|m| Duration::from_millis(*m)).collect::<Vec<_>>();
        assert_eq!(s.offsets_for(TriggerKind::OrderActivated), ms(&[50, 120, 300]));
        assert_eq!(s.offsets_for(TriggerKind::CustomerAssigned), ms(&[50, 120, 300, 800]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_executes_every_planned_correction() {
        let s = scheduler();
        let order = MemoryOrder::snake_case("o-1").into_handle();

        let run = s.schedule(session(), order.clone(), TriggerKind::CustomerAssigned);
        assert_eq!(run.planned_corrections(), 5);

        let report = run.finished().await.unwrap();
        assert_eq!(report.corrections, 5);
        assert!(report.converged);
        assert_eq!(order.lock().await.calls_to("set_is_takeaway").len(), 5);

        let snapshot = s.metrics.snapshot().await;
        assert_eq!(snapshot.runs_scheduled, 1);
        assert_eq!(snapshot.corrections, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_correction_precedes_first_offset() {
        let s = scheduler();
        let order = MemoryOrder::snake_case("o-1").into_handle();

        let _run = s.schedule(session(), order.clone(), TriggerKind::OrderActivated);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let guard = order.lock().await;
        assert_eq!(guard.calls_to("set_is_takeaway").len(), 1);
        assert_eq!(guard.policy_key(), Some(HostKey::from(42)));
    }

    #[test]
    fn test_without_runtime_corrects_inline() {
        let s = scheduler();
        let order = MemoryOrder::snake_case("o-1").into_handle();

        let run = s.schedule(session(), order.clone(), TriggerKind::Manual);
        let report = futures::executor::block_on(run.finished()).unwrap();

        assert_eq!(report.corrections, 1);
        assert!(report.converged);
        assert!(order.try_lock().unwrap().is_takeaway());
    }
}
