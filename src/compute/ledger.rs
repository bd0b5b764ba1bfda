//! ledger.rs
//! Per-run cache slots, the `Value` type and the engine's error enum.

use crate::store::{CacheScope, NodeId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    /// Raised by a user equation. Propagated to the reader as-is.
    #[error("{0}")]
    Equation(String),
    #[error("Division by zero at node '{node_name}'")]
    DivisionByZero { node_name: String },
    #[error("Shape mismatch at node '{node_name}': {lhs} vs {rhs} elements")]
    ShapeMismatch { node_name: String, lhs: usize, rhs: usize },
    #[error("Parent count mismatch at '{node_name}': expected {expected}, got {actual}")]
    ParentCountMismatch { node_name: String, expected: usize, actual: usize },
    #[error("Cycle detected: {}", nodes.join(" -> "))]
    CycleDetected { nodes: Vec<String> },
    #[error("Unknown quantity '{0}'")]
    UnknownQuantity(String),
    #[error("Duplicate quantity name '{0}'")]
    DuplicateName(String),
    #[error("Invalid node reference {0:?}")]
    InvalidNode(NodeId),
    #[error("Invalid definition of '{node_name}': {message}")]
    InvalidDefinition { node_name: String, message: String },
    #[error("Stock '{0}' has no rate or initial value bound")]
    UnboundStock(String),
    #[error("Stock '{0}' was read before it was initialized")]
    StockUninitialized(String),
    #[error("Stock '{stock}' was already advanced in step {step}")]
    StockAlreadyAdvanced { stock: String, step: u64 },
    #[error("'{0}' cannot be overridden")]
    NotOverridable(String),
    #[error("Run has not been initialized")]
    RunNotInitialized,
    #[error("Run already reached its final time ({time})")]
    RunFinished { time: f64 },
    #[error("Invalid time step {0}")]
    InvalidTimeStep(f64),
    #[error("Invalid simulation config: {0}")]
    InvalidConfig(String),
}

/// A node's value: a single number or an array of numbers (subscripted quantity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f64),
    Array(Arc<Vec<f64>>),
}

impl Value {
    pub fn len(&self) -> usize {
        match self { Value::Scalar(_) => 1, Value::Array(v) => v.len() }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn as_scalar(&self) -> Option<f64> {
        match self { Value::Scalar(s) => Some(*s), Value::Array(_) => None }
    }

    #[inline(always)]
    pub fn get_at(&self, i: usize) -> f64 {
        match self {
            Value::Scalar(s) => *s,
            Value::Array(vec) => vec[i],
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        match self { Value::Scalar(s) => vec![*s], Value::Array(s) => s.to_vec() }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Scalar(v) }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self { Value::Array(Arc::new(v)) }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    /// Clock step at which the slot was filled.
    step: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    slots: Vec<Option<CacheEntry>>,
    stats: CacheStats,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    pub fn ensure_capacity(&mut self, size: usize) {
        if self.slots.len() < size {
            self.slots.resize(size, None);
        }
    }

    /// Returns the cached value if it is still valid for `scope` at `step`.
    pub fn peek(&self, node_id: NodeId, scope: CacheScope, step: u64) -> Option<&Value> {
        let entry = self.slots.get(node_id.index())?.as_ref()?;
        match scope {
            CacheScope::Run => Some(&entry.value),
            CacheScope::Step if entry.step == step => Some(&entry.value),
            CacheScope::Step | CacheScope::None => None,
        }
    }

    /// Like `peek`, but records the hit or miss.
    pub fn lookup(&mut self, node_id: NodeId, scope: CacheScope, step: u64) -> Option<Value> {
        let found = self.peek(node_id, scope, step).cloned();
        if found.is_some() {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }
        found
    }

    /// Fills the slot. Unmemoized nodes are never stored.
    pub fn insert(&mut self, node_id: NodeId, scope: CacheScope, step: u64, value: Value) {
        if scope == CacheScope::None {
            return;
        }
        let idx = node_id.index();
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, None);
        }
        self.slots[idx] = Some(CacheEntry { value, step });
    }

    /// Drops every cached value; called when a new run begins.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.stats = CacheStats::default();
    }

    pub fn stats(&self) -> CacheStats { self.stats }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_scope_survives_step_change() {
        let mut ledger = Ledger::new();
        ledger.insert(NodeId(0), CacheScope::Run, 0, Value::Scalar(3.0));
        assert_eq!(ledger.lookup(NodeId(0), CacheScope::Run, 17), Some(Value::Scalar(3.0)));
    }

    #[test]
    fn test_step_scope_goes_stale() {
        let mut ledger = Ledger::new();
        ledger.insert(NodeId(2), CacheScope::Step, 4, Value::Scalar(1.5));
        assert_eq!(ledger.lookup(NodeId(2), CacheScope::Step, 4), Some(Value::Scalar(1.5)));
        assert_eq!(ledger.lookup(NodeId(2), CacheScope::Step, 5), None);
        assert_eq!(ledger.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_unmemoized_never_stored() {
        let mut ledger = Ledger::new();
        ledger.insert(NodeId(0), CacheScope::None, 0, Value::Scalar(1.0));
        assert!(ledger.peek(NodeId(0), CacheScope::None, 0).is_none());
        assert!(ledger.peek(NodeId(0), CacheScope::Run, 0).is_none());
    }

    #[test]
    fn test_clear_empties_all_slots() {
        let mut ledger = Ledger::new();
        ledger.ensure_capacity(3);
        ledger.insert(NodeId(1), CacheScope::Run, 0, Value::Scalar(1.0));
        ledger.clear();
        assert!(ledger.peek(NodeId(1), CacheScope::Run, 0).is_none());
        assert_eq!(ledger.stats(), CacheStats::default());
    }

    #[test]
    fn test_value_json_shape() {
        let scalar: Value = serde_json::from_str("0.03").unwrap();
        let array: Value = serde_json::from_str("[1.0, 2.0]").unwrap();
        assert_eq!(scalar, Value::Scalar(0.03));
        assert_eq!(array, Value::from(vec![1.0, 2.0]));
    }
}
