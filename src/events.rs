// Copyright 2025 Cowboy AI, LLC.

//! Host lifecycle events
//!
//! The host fires these; the engine only observes them. Each event carries
//! the session and/or order it concerns, so the engine never has to reach
//! into host globals to find them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::host::{HostSession, SharedOrder};

/// Which lifecycle event caused a correction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Session bootstrap
    SessionInitialized,
    /// A new order began
    OrderCreated,
    /// The active order changed
    OrderActivated,
    /// A customer was attached to an order
    CustomerAssigned,
    /// Something set the order's policy
    PolicyChanged,
    /// Called directly, outside the event binding
    Manual,
}

impl TriggerKind {
    /// Whether the host is known to overwrite the policy after this trigger
    pub fn races_policy_reset(&self) -> bool {
        matches!(self, TriggerKind::CustomerAssigned)
    }

    /// Stable name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::SessionInitialized => "session_initialized",
            TriggerKind::OrderCreated => "order_created",
            TriggerKind::OrderActivated => "order_activated",
            TriggerKind::CustomerAssigned => "customer_assigned",
            TriggerKind::PolicyChanged => "policy_changed",
            TriggerKind::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event exposed by the host
#[derive(Clone)]
pub enum HostEvent {
    /// Fired once per session bootstrap
    SessionInitialized {
        /// The session
        session: Arc<dyn HostSession>,
    },
    /// A new order began; when `order` is absent the session's current order is used
    OrderCreated {
        /// The session
        session: Arc<dyn HostSession>,
        /// The order the host returned
        order: Option<SharedOrder>,
    },
    /// The active order changed
    OrderActivated {
        /// The session
        session: Arc<dyn HostSession>,
        /// Newly active order
        order: SharedOrder,
    },
    /// A customer was attached; the order's own session is used
    CustomerAssigned {
        /// The order
        order: SharedOrder,
        /// Customer reference as the host encodes it
        customer: Option<Value>,
    },
    /// Something set the order's policy, possibly the engine itself
    PolicyChanged {
        /// The order
        order: SharedOrder,
        /// The policy that was just set
        new_policy: Value,
    },
}

impl HostEvent {
    /// Trigger kind of this event
    pub fn kind(&self) -> TriggerKind {
        match self {
            HostEvent::SessionInitialized { .. } => TriggerKind::SessionInitialized,
            HostEvent::OrderCreated { .. } => TriggerKind::OrderCreated,
            HostEvent::OrderActivated { .. } => TriggerKind::OrderActivated,
            HostEvent::CustomerAssigned { .. } => TriggerKind::CustomerAssigned,
            HostEvent::PolicyChanged { .. } => TriggerKind::PolicyChanged,
        }
    }
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("HostEvent");
        s.field("kind", &self.kind());
        match self {
            HostEvent::CustomerAssigned { customer, .. } => {
                s.field("customer", customer);
            }
            HostEvent::PolicyChanged { new_policy, .. } => {
                s.field("new_policy", new_policy);
            }
            _ => {}
        }
        s.finish()
    }
}
