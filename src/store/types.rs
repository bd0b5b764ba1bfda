use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// Lifetime of a node's cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// Computed once per simulation run.
    Run,
    /// Recomputed once whenever the clock's step changes.
    Step,
    /// Re-evaluated on every read.
    None,
}

impl fmt::Display for CacheScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheScope::Run => write!(f, "run"),
            CacheScope::Step => write!(f, "step"),
            CacheScope::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit(pub String);

/// Descriptive data carried alongside a node. Never interpreted by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Identifier used for lookups (e.g. `growth_fraction`).
    pub name: String,
    /// Name as written in the source model (e.g. `Growth Fraction`).
    pub real_name: Option<String>,
    pub unit: Option<Unit>,
    pub doc: Option<String>,
}

impl NodeMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_real_name(mut self, real_name: impl Into<String>) -> Self {
        self.real_name = Some(real_name.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(Unit(unit.into()));
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

impl From<&str> for NodeMetadata {
    fn from(name: &str) -> Self { Self::new(name) }
}

impl From<String> for NodeMetadata {
    fn from(name: String) -> Self { Self::new(name) }
}

/// Built-in binary/unary formulas. Parent order matters for `Subtract` and `Divide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Passes its single parent through unchanged.
    Identity,
}

impl Operation {
    pub fn arity(&self) -> usize {
        match self {
            Operation::Identity => 1,
            _ => 2,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Subtract => "-",
            Operation::Multiply => "*",
            Operation::Divide => "/",
            Operation::Identity => "=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Index into `constants_data`.
    Constant(u32),
    Formula(Operation),
    /// Index into `equations`.
    Equation(u32),
    /// Index into `stocks`.
    Stock(u32),
    /// The simulation clock's current time.
    Time,
}
