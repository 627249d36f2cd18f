// Copyright 2025 Cowboy AI, LLC.

//! Host event binding
//!
//! Turns host lifecycle events into scheduled correction runs. Every event
//! resolves the session it belongs to and checks the scope before anything
//! is scheduled. Policy-change events additionally pass a loop guard so the
//! engine's own policy writes do not retrigger it forever.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::resolver::policy_key_of;
use crate::engine::ReconciliationEngine;
use crate::errors::{ReconcileError, ReconcileResult};
use crate::event_handler::EventHandler;
use crate::events::{HostEvent, TriggerKind};
use crate::host::{HostSession, SharedOrder};
use crate::infrastructure::scheduler::ScheduledRun;
use crate::metrics::SKIPPED_RETRIGGERS;

/// Routes host events to the engine
#[derive(Clone)]
pub struct EventBinding {
    engine: Arc<ReconciliationEngine>,
}

impl EventBinding {
    /// Bind to `engine`
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self { engine }
    }

    /// The engine events are routed to
    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    /// Handle one event, returning the run it scheduled if any
    pub async fn dispatch(&self, event: HostEvent) -> Option<ScheduledRun> {
        let trigger = event.kind();
        match event {
            HostEvent::SessionInitialized { session } => {
                let Some(order) = session.current_order() else {
                    debug!(trigger = %trigger, "Session has no current order");
                    return None;
                };
                self.govern(session, order, trigger).await
            }
            HostEvent::OrderCreated { session, order } => {
                let Some(order) = order.or_else(|| session.current_order()) else {
                    debug!(trigger = %trigger, "Created order is not available");
                    return None;
                };
                self.govern(session, order, trigger).await
            }
            HostEvent::OrderActivated { session, order } => {
                self.govern(session, order, trigger).await
            }
            HostEvent::CustomerAssigned { order, .. } => {
                let session = order_session(&order, trigger).await?;
                self.govern(session, order, trigger).await
            }
            HostEvent::PolicyChanged { order, new_policy } => {
                let session = order_session(&order, trigger).await?;
                if !self.engine.corrector().scope().in_scope(Some(session.as_ref())) {
                    debug!(trigger = %trigger, "Session out of scope");
                    return None;
                }
                if !self.needs_reassertion(session.as_ref(), &order, &new_policy).await {
                    self.engine.metrics().increment(SKIPPED_RETRIGGERS).await;
                    return None;
                }
                self.govern(session, order, trigger).await
            }
        }
    }

    /// Feed every event of `events` through [`dispatch`](Self::dispatch) on a
    /// background task of `runtime`
    pub fn spawn_on(
        self,
        runtime: &Handle,
        mut events: impl Stream<Item = HostEvent> + Send + Unpin + 'static,
    ) -> JoinHandle<()> {
        runtime.spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = self.handle(event).await {
                    warn!(error = %e, "Failed to handle host event");
                }
            }
            info!("Host event stream closed");
        })
    }

    async fn govern(
        &self,
        session: Arc<dyn HostSession>,
        order: SharedOrder,
        trigger: TriggerKind,
    ) -> Option<ScheduledRun> {
        if !self.engine.corrector().scope().in_scope(Some(session.as_ref())) {
            debug!(trigger = %trigger, "Session out of scope");
            return None;
        }
        Some(self.engine.schedule(session, order, trigger).await)
    }

    /// Loop guard: a policy change only matters on an order that is already
    /// takeaway and whose new policy differs from the target.
    async fn needs_reassertion(
        &self,
        session: &dyn HostSession,
        order: &SharedOrder,
        new_policy: &Value,
    ) -> bool {
        let corrector = self.engine.corrector();
        let classified = {
            let mut guard = order.lock().await;
            corrector.is_classified(&mut *guard)
        };
        if !classified {
            debug!("Policy changed on an order that is not takeaway");
            return false;
        }

        let target = corrector.resolver().resolve_takeaway_policy_id(session);
        let incoming = policy_key_of(new_policy);
        if target.is_some() && incoming == target {
            debug!(policy = ?incoming, "Policy change matches the takeaway policy");
            return false;
        }
        debug!(
            policy = ?incoming,
            target = ?target,
            "Policy change drifted from the takeaway policy"
        );
        true
    }
}

async fn order_session(order: &SharedOrder, trigger: TriggerKind) -> Option<Arc<dyn HostSession>> {
    let session = order.lock().await.session();
    if session.is_none() {
        debug!(trigger = %trigger, "Order has no session");
    }
    session
}

#[async_trait]
impl EventHandler<HostEvent> for EventBinding {
    type Error = ReconcileError;

    async fn handle(&self, event: HostEvent) -> ReconcileResult<()> {
        self.dispatch(event).await;
        Ok(())
    }
}
