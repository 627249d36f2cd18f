// Copyright 2025 Cowboy AI, LLC.

//! In-memory host records
//!
//! `MemorySession` and `MemoryOrder` stand in for the real host when
//! embedding the engine in tests or simulations. A `MemoryOrder` exposes only
//! the operations it was built with, so each host shape (snake_case build,
//! camelCase build, bare record) can be reproduced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, Weak};

use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

use crate::domain::resolver::policy_key_of;
use crate::errors::HostError;
use crate::host::{HostOrder, HostSession, PolicyCatalog, SharedOrder};
use crate::identifiers::{HostKey, OrderKey};

/// Session configuration held in memory
#[derive(Debug, Default)]
pub struct MemorySession {
    id: Option<Value>,
    name: Option<String>,
    config: Map<String, Value>,
    catalog: Option<PolicyCatalog>,
    current: StdMutex<Option<SharedOrder>>,
}

impl MemorySession {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session identifier
    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a configuration field
    pub fn with_config(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(field.into(), value.into());
        self
    }

    /// Attach a policy catalog
    pub fn with_catalog(mut self, catalog: PolicyCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Finish building
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Make `order` the session's current order
    pub fn set_current_order(&self, order: Option<SharedOrder>) {
        if let Ok(mut current) = self.current.lock() {
            *current = order;
        }
    }
}

impl HostSession for MemorySession {
    fn session_id(&self) -> Option<Value> {
        self.id.clone()
    }

    fn display_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn config_field(&self, name: &str) -> Option<Value> {
        self.config.get(name).cloned()
    }

    fn policy_catalog(&self) -> Option<&PolicyCatalog> {
        self.catalog.as_ref()
    }

    fn current_order(&self) -> Option<SharedOrder> {
        self.current.lock().ok().and_then(|current| current.clone())
    }
}

/// What a named operation on a `MemoryOrder` does
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryMethod {
    /// Write the first argument into every listed field
    Setter(Vec<String>),
    /// Return the value of a field
    Getter(String),
    /// Recompute `computed_totals` from the governed fields
    Recompute,
    /// Record a change notification
    Notify,
    /// Raise with the given message
    Fail(String),
}

/// One recorded operation call
#[derive(Debug, Clone, PartialEq)]
pub struct HostCall {
    /// Operation name
    pub operation: String,
    /// Arguments passed
    pub args: Vec<Value>,
}

/// Field holding the derived totals
pub const TOTALS_FIELD: &str = "computed_totals";

const FLAG_FIELDS: [&str; 2] = ["is_takeaway", "isTakeaway"];
const POLICY_FIELDS: [&str; 2] = ["fiscal_position", "fiscalPosition"];

/// Order record held in memory
#[derive(Debug)]
pub struct MemoryOrder {
    key: OrderKey,
    session: Option<Weak<dyn HostSession>>,
    methods: HashMap<String, MemoryMethod>,
    fields: Map<String, Value>,
    frozen_fields: Vec<String>,
    calls: Vec<HostCall>,
    notifications: usize,
}

impl MemoryOrder {
    /// Create an order that exposes no operations at all
    pub fn bare(key: impl Into<String>) -> Self {
        Self {
            key: OrderKey::new(key),
            session: None,
            methods: HashMap::new(),
            fields: Map::new(),
            frozen_fields: Vec::new(),
            calls: Vec::new(),
            notifications: 0,
        }
    }

    /// Order shaped like a snake_case host build
    pub fn snake_case(key: impl Into<String>) -> Self {
        Self::bare(key)
            .with_method("set_is_takeaway", MemoryMethod::Setter(vec!["is_takeaway".into()]))
            .with_method("get_is_takeaway", MemoryMethod::Getter("is_takeaway".into()))
            .with_method(
                "set_fiscal_position",
                MemoryMethod::Setter(vec!["fiscal_position".into()]),
            )
            .with_method("recompute_tax", MemoryMethod::Recompute)
            .with_method("trigger", MemoryMethod::Notify)
    }

    /// Order shaped like a camelCase host build
    pub fn camel_case(key: impl Into<String>) -> Self {
        Self::bare(key)
            .with_method("setIsTakeaway", MemoryMethod::Setter(vec!["isTakeaway".into()]))
            .with_method("getIsTakeaway", MemoryMethod::Getter("isTakeaway".into()))
            .with_method(
                "setFiscalPosition",
                MemoryMethod::Setter(vec!["fiscalPosition".into()]),
            )
            .with_method("recomputeTaxes", MemoryMethod::Recompute)
    }

    /// Expose an operation
    pub fn with_method(mut self, operation: impl Into<String>, method: MemoryMethod) -> Self {
        self.methods.insert(operation.into(), method);
        self
    }

    /// Seed a field
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Make direct writes to `field` fail
    pub fn with_frozen_field(mut self, field: impl Into<String>) -> Self {
        self.frozen_fields.push(field.into());
        self
    }

    /// Attach the owning session
    pub fn with_session<S: HostSession + 'static>(mut self, session: &Arc<S>) -> Self {
        let weak: Weak<dyn HostSession> = Arc::downgrade(session) as Weak<dyn HostSession>;
        self.session = Some(weak);
        self
    }

    /// Wrap into a typed handle; it coerces to `SharedOrder` wherever one is expected
    pub fn into_handle(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    /// Every operation invoked so far, in order
    pub fn calls(&self) -> &[HostCall] {
        &self.calls
    }

    /// Calls to one operation
    pub fn calls_to(&self, operation: &str) -> Vec<&HostCall> {
        self.calls.iter().filter(|c| c.operation == operation).collect()
    }

    /// Number of change notifications received
    pub fn notifications(&self) -> usize {
        self.notifications
    }

    /// Current raw field value
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Takeaway flag as stored under either spelling
    pub fn is_takeaway(&self) -> bool {
        FLAG_FIELDS
            .iter()
            .any(|f| self.fields.get(*f) == Some(&Value::Bool(true)))
    }

    /// Key of the currently assigned policy, under either spelling
    pub fn policy_key(&self) -> Option<HostKey> {
        POLICY_FIELDS
            .iter()
            .find_map(|f| self.fields.get(*f))
            .and_then(policy_key_of)
    }

    /// Simulate the host resetting the policy, as it does when a customer is set
    pub fn overwrite_policy(&mut self, policy: impl Into<Value>) {
        let policy = policy.into();
        let mut targets: Vec<&str> = POLICY_FIELDS
            .into_iter()
            .filter(|f| self.fields.contains_key(*f))
            .collect();
        if targets.is_empty() {
            targets.push(POLICY_FIELDS[0]);
        }
        for field in targets {
            self.fields.insert(field.to_string(), policy.clone());
        }
    }

    fn recompute(&mut self) {
        let totals = json!({
            "takeaway": self.is_takeaway(),
            "policy": self.policy_key().map(|k| k.to_value()),
        });
        self.fields.insert(TOTALS_FIELD.to_string(), totals);
    }
}

impl HostOrder for MemoryOrder {
    fn key(&self) -> OrderKey {
        self.key.clone()
    }

    fn session(&self) -> Option<Arc<dyn HostSession>> {
        self.session.as_ref().and_then(Weak::upgrade)
    }

    fn responds_to(&self, operation: &str) -> bool {
        self.methods.contains_key(operation)
    }

    fn invoke(&mut self, operation: &str, args: &[Value]) -> Result<Value, HostError> {
        let method = self
            .methods
            .get(operation)
            .cloned()
            .ok_or_else(|| HostError::missing(operation))?;

        self.calls.push(HostCall {
            operation: operation.to_string(),
            args: args.to_vec(),
        });

        match method {
            MemoryMethod::Setter(fields) => {
                let value = args.first().cloned().unwrap_or(Value::Null);
                for field in fields {
                    self.fields.insert(field, value.clone());
                }
                Ok(Value::Null)
            }
            MemoryMethod::Getter(field) => {
                Ok(self.fields.get(&field).cloned().unwrap_or(Value::Null))
            }
            MemoryMethod::Recompute => {
                self.recompute();
                Ok(Value::Null)
            }
            MemoryMethod::Notify => {
                self.notifications += 1;
                Ok(Value::Null)
            }
            MemoryMethod::Fail(reason) => Err(HostError::rejected(operation, reason)),
        }
    }

    fn read_field(&self, field: &str) -> Option<Value> {
        self.fields.get(field).cloned()
    }

    fn write_field(&mut self, field: &str, value: Value) -> Result<(), HostError> {
        if self.frozen_fields.iter().any(|f| f == field) {
            return Err(HostError::FieldRejected {
                field: field.to_string(),
                reason: "field is read-only".to_string(),
            });
        }
        self.fields.insert(field.to_string(), value);
        Ok(())
    }
}
