// Copyright 2025 Cowboy AI, LLC.

//! Capability probes
//!
//! Host orders expose zero, one, or several spellings of the same semantic
//! action. Each probe here is a pure function from an order to the strategy
//! that will be used, so choosing a strategy and applying it stay separate
//! and each strategy can be tested against an order exposing only it.

use serde_json::Value;

use crate::errors::HostError;
use crate::host::HostOrder;

/// How a value gets written onto an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutatorStrategy {
    /// Call a setter method
    Method(String),
    /// Assign fields directly; every listed field is written
    Fields(Vec<String>),
}

impl MutatorStrategy {
    /// Short label used in logs and outcomes
    pub fn label(&self) -> String {
        match self {
            MutatorStrategy::Method(name) => format!("method:{name}"),
            MutatorStrategy::Fields(fields) => format!("fields:{}", fields.join(",")),
        }
    }
}

/// How a flag gets read back from an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Call a getter method
    Getter(String),
    /// Inspect fields; any one holding `true` counts
    Fields(Vec<String>),
}

/// First setter the order responds to, else direct field assignment
pub fn probe_setter(
    order: &dyn HostOrder,
    setters: &[String],
    fields: &[String],
) -> MutatorStrategy {
    setters
        .iter()
        .find(|name| order.responds_to(name))
        .map(|name| MutatorStrategy::Method(name.clone()))
        .unwrap_or_else(|| MutatorStrategy::Fields(fields.to_vec()))
}

/// First getter the order responds to, else field inspection
pub fn probe_getter(order: &dyn HostOrder, getters: &[String], fields: &[String]) -> ReadStrategy {
    getters
        .iter()
        .find(|name| order.responds_to(name))
        .map(|name| ReadStrategy::Getter(name.clone()))
        .unwrap_or_else(|| ReadStrategy::Fields(fields.to_vec()))
}

/// Every listed operation the order responds to, in list order
pub fn probe_all(order: &dyn HostOrder, operations: &[String]) -> Vec<String> {
    operations
        .iter()
        .filter(|name| order.responds_to(name))
        .cloned()
        .collect()
}

/// Write `value` with the chosen strategy
///
/// Field assignment succeeds when at least one field accepted the write.
pub fn apply_setter(
    order: &mut dyn HostOrder,
    strategy: &MutatorStrategy,
    value: &Value,
) -> Result<(), HostError> {
    match strategy {
        MutatorStrategy::Method(name) => order
            .invoke(name, std::slice::from_ref(value))
            .map(|_| ()),
        MutatorStrategy::Fields(fields) => {
            let mut last_error = None;
            let mut written = 0usize;
            for field in fields {
                match order.write_field(field, value.clone()) {
                    Ok(()) => written += 1,
                    Err(err) => last_error = Some(err),
                }
            }
            match (written, last_error) {
                (0, Some(err)) => Err(err),
                (0, None) => Err(HostError::FieldRejected {
                    field: String::new(),
                    reason: "no field configured".to_string(),
                }),
                _ => Ok(()),
            }
        }
    }
}

/// Read a boolean flag; any host failure reads as `false`
pub fn read_flag(order: &mut dyn HostOrder, strategy: &ReadStrategy) -> bool {
    match strategy {
        ReadStrategy::Getter(name) => order
            .invoke(name, &[])
            .map(|value| truthy(&value))
            .unwrap_or(false),
        ReadStrategy::Fields(fields) => fields
            .iter()
            .any(|field| order.read_field(field) == Some(Value::Bool(true))),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
