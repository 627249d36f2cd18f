// Copyright 2025 Cowboy AI, LLC.

//! Reconciliation engine
//!
//! Owns the corrector, the scheduler and the enrollment table. Orders are
//! enrolled the first time a run is scheduled for them; enrollment is kept
//! beside the order rather than on it so host objects are never extended.
//! The table is an LRU bounded by `enrollment_capacity`. Hosts that know
//! when an order is finalized call [`ReconciliationEngine::forget`]; an
//! evicted order that triggers again is simply enrolled anew.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::stream::Stream;
use lru::LruCache;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::domain::{LocationScope, OrderCorrector};
use crate::errors::{ReconcileError, ReconcileResult};
use crate::events::{HostEvent, TriggerKind};
use crate::host::{HostSession, SharedOrder};
use crate::identifiers::OrderKey;
use crate::infrastructure::{EventBinding, ReconciliationScheduler, ScheduledRun};
use crate::metrics::EngineMetrics;

/// Keeps governed orders classified as takeaway
pub struct ReconciliationEngine {
    config: EngineConfig,
    corrector: Arc<OrderCorrector>,
    scheduler: ReconciliationScheduler,
    metrics: EngineMetrics,
    enrolled: Mutex<LruCache<OrderKey, ()>>,
    installed: AtomicBool,
}

impl ReconciliationEngine {
    /// Build an engine from a validated configuration
    pub fn new(config: EngineConfig) -> ReconcileResult<Self> {
        config.validate()?;
        let scope = LocationScope::from_config(&config.scope)?;
        let capacity = NonZeroUsize::new(config.enrollment_capacity).ok_or_else(|| {
            ReconcileError::configuration("enrollment capacity must be at least 1")
        })?;
        let corrector = Arc::new(OrderCorrector::new(scope, config.vocabulary.clone()));
        let metrics = EngineMetrics::new();
        let scheduler = ReconciliationScheduler::new(
            Arc::clone(&corrector),
            config.schedule.clone(),
            metrics.clone(),
        );

        info!(scope = %corrector.scope(), "Reconciliation engine created");
        Ok(Self {
            config,
            corrector,
            scheduler,
            metrics,
            enrolled: Mutex::new(LruCache::new(capacity)),
            installed: AtomicBool::new(false),
        })
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The correction core
    pub fn corrector(&self) -> &OrderCorrector {
        &self.corrector
    }

    /// The scheduler
    pub fn scheduler(&self) -> &ReconciliationScheduler {
        &self.scheduler
    }

    /// Shared counters
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Correct `order` once, right now
    pub async fn correct(&self, session: &dyn HostSession, order: &SharedOrder) -> bool {
        let mut guard = order.lock().await;
        self.corrector.correct(Some(session), Some(&mut *guard))
    }

    /// Enroll `order` and start a run of corrections for it
    pub async fn schedule(
        &self,
        session: Arc<dyn HostSession>,
        order: SharedOrder,
        trigger: TriggerKind,
    ) -> ScheduledRun {
        let key = order.lock().await.key();
        if self.enroll(key.clone()) {
            info!(order = %key, trigger = %trigger, "Order enrolled for takeaway reconciliation");
        } else {
            debug!(order = %key, trigger = %trigger, "Rescheduling enrolled order");
        }
        self.scheduler.schedule(session, order, trigger)
    }

    /// Whether `key` is in the enrollment table
    pub fn is_enrolled(&self, key: &OrderKey) -> bool {
        self.enrolled
            .lock()
            .map(|enrolled| enrolled.contains(key))
            .unwrap_or(false)
    }

    /// Drop `key` from the enrollment table, e.g. once the host finalized the order
    pub fn forget(&self, key: &OrderKey) -> bool {
        self.enrolled
            .lock()
            .map(|mut enrolled| enrolled.pop(key).is_some())
            .unwrap_or(false)
    }

    /// Number of enrolled orders
    pub fn enrolled_count(&self) -> usize {
        self.enrolled.lock().map(|enrolled| enrolled.len()).unwrap_or(0)
    }

    /// Route host events to this engine on a background task
    ///
    /// An engine accepts one event source; a second call fails with
    /// [`ReconcileError::AlreadyInstalled`]. Must be called from within a
    /// tokio runtime.
    pub fn install(
        self: &Arc<Self>,
        events: impl Stream<Item = HostEvent> + Send + Unpin + 'static,
    ) -> ReconcileResult<JoinHandle<()>> {
        let runtime = Handle::try_current().map_err(|e| {
            ReconcileError::configuration(format!("event binding needs a tokio runtime: {e}"))
        })?;
        if self.installed.swap(true, Ordering::SeqCst) {
            return Err(ReconcileError::AlreadyInstalled);
        }
        info!("Installing host event binding");
        Ok(EventBinding::new(Arc::clone(self)).spawn_on(&runtime, events))
    }

    /// Install with an in-process channel the host pushes its events into
    pub fn install_channel(
        self: &Arc<Self>,
    ) -> ReconcileResult<(mpsc::UnboundedSender<HostEvent>, JoinHandle<()>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.install(UnboundedReceiverStream::new(rx))?;
        Ok((tx, handle))
    }

    fn enroll(&self, key: OrderKey) -> bool {
        self.enrolled
            .lock()
            .map(|mut enrolled| enrolled.put(key, ()).is_none())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScheduleConfig, ScopeConfig};
    use crate::host::memory::{MemoryOrder, MemorySession};

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            schedule: ScheduleConfig {
                offsets_ms: vec![120, 50],
                customer_tail_ms: vec![800],
            },
            ..EngineConfig::default()
        };
        let err = ReconciliationEngine::new(config).err().unwrap();
        assert!(err.is_configuration_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_enrolls_once() {
        let engine = ReconciliationEngine::new(EngineConfig {
            scope: ScopeConfig::SessionId { id: 3.into() },
            ..EngineConfig::default()
        })
        .unwrap();
        let session = MemorySession::new().with_id(3).with_config("takeawayPolicyId", 42).build();
        let order = MemoryOrder::snake_case("o-9").into_handle();
        let key = OrderKey::new("o-9");

        assert!(!engine.is_enrolled(&key));
        let first = engine.schedule(session.clone(), order.clone(), TriggerKind::Manual).await;
        let second = engine.schedule(session, order.clone(), TriggerKind::Manual).await;
        assert_ne!(first.run_id(), second.run_id());
        assert!(engine.is_enrolled(&key));
        assert_eq!(engine.enrolled_count(), 1);

        first.finished().await.unwrap();
        second.finished().await.unwrap();
        assert_eq!(order.lock().await.policy_key(), Some(42.into()));

        assert!(engine.forget(&key));
        assert!(!engine.is_enrolled(&key));
    }

    #[tokio::test]
    async fn test_install_twice_fails() {
        let engine = Arc::new(ReconciliationEngine::new(EngineConfig::default()).unwrap());
        let handle = engine.install(futures::stream::empty()).unwrap();
        assert!(matches!(
            engine.install(futures::stream::empty()),
            Err(ReconcileError::AlreadyInstalled)
        ));
        handle.await.unwrap();
        assert!(engine.install_channel().is_err());
    }

    #[test]
    fn test_install_without_runtime_is_an_error() {
        let engine = Arc::new(ReconciliationEngine::new(EngineConfig::default()).unwrap());
        let err = engine.install(futures::stream::empty()).unwrap_err();
        assert!(err.is_configuration_error());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let handle = engine.install(futures::stream::empty()).unwrap();
            handle.await.unwrap();
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrollment_is_bounded() {
        let engine = ReconciliationEngine::new(EngineConfig {
            enrollment_capacity: 2,
            ..EngineConfig::default()
        })
        .unwrap();
        let session = MemorySession::new().with_name("Piso 1").build();

        for key in ["o-1", "o-2", "o-3"] {
            let order = MemoryOrder::snake_case(key).into_handle();
            engine
                .schedule(session.clone(), order, TriggerKind::Manual)
                .await
                .finished()
                .await
                .unwrap();
        }

        assert_eq!(engine.enrolled_count(), 2);
        assert!(!engine.is_enrolled(&OrderKey::new("o-1")));
        assert!(engine.is_enrolled(&OrderKey::new("o-3")));
    }
}
