use super::types::*;
use crate::compute::kernel::EquationFn;
use crate::compute::ledger::{ComputationError, Value};
use std::collections::HashMap;

/// Where a stock takes its value from when a run starts.
#[derive(Debug, Clone, PartialEq)]
pub enum StockInit {
    Value(Value),
    Node(NodeId),
}

impl From<f64> for StockInit {
    fn from(v: f64) -> Self { StockInit::Value(Value::Scalar(v)) }
}

impl From<Value> for StockInit {
    fn from(v: Value) -> Self { StockInit::Value(v) }
}

impl From<NodeId> for StockInit {
    fn from(id: NodeId) -> Self { StockInit::Node(id) }
}

/// Binding of a stock node to its rate and initial value.
/// Both are filled in by `bind_stock`, after the nodes they refer to exist.
#[derive(Debug, Clone)]
pub struct StockDef {
    pub node: NodeId,
    pub rate: Option<NodeId>,
    pub initial: Option<StockInit>,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    // Columnar Arrays
    pub kinds: Vec<NodeKind>,
    pub scopes: Vec<CacheScope>,
    pub meta: Vec<NodeMetadata>,

    // Topology (CSR)
    pub parents_flat: Vec<NodeId>,
    pub parents_ranges: Vec<(u32, u32)>, // (start, count)

    // Data Blobs
    pub constants_data: Vec<Value>,
    pub equations: Vec<EquationFn>,
    pub stocks: Vec<StockDef>,

    // Identifier -> node, plus alternative spellings (real names, `TIME`)
    pub names: HashMap<String, NodeId>,
    pub aliases: HashMap<String, NodeId>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.kinds.len() }

    pub fn add_node(
        &mut self,
        kind: NodeKind,
        scope: CacheScope,
        parents: &[NodeId],
        meta: NodeMetadata,
    ) -> Result<NodeId, ComputationError> {
        let id = NodeId(self.kinds.len() as u32);

        if meta.name.trim().is_empty() {
            return Err(ComputationError::InvalidDefinition {
                node_name: meta.name,
                message: "quantity name must not be empty".into(),
            });
        }
        if self.names.contains_key(&meta.name) || self.aliases.contains_key(&meta.name) {
            return Err(ComputationError::DuplicateName(meta.name));
        }
        if let Some(real) = meta.real_name.as_ref().filter(|r| **r != meta.name) {
            if self.names.contains_key(real) || self.aliases.contains_key(real) {
                return Err(ComputationError::DuplicateName(real.clone()));
            }
        }
        if let Some(&bad) = parents.iter().find(|p| p.index() >= self.kinds.len()) {
            return Err(ComputationError::InvalidNode(bad));
        }

        // 1. Register Parents
        let start = self.parents_flat.len() as u32;
        let count = parents.len() as u32;
        self.parents_flat.extend_from_slice(parents);
        self.parents_ranges.push((start, count));

        // 2. Namespace
        self.names.insert(meta.name.clone(), id);
        if let Some(real) = &meta.real_name {
            if real != &meta.name {
                self.aliases.insert(real.clone(), id);
            }
        }

        // 3. Metadata
        self.kinds.push(kind);
        self.scopes.push(scope);
        self.meta.push(meta);

        Ok(id)
    }

    pub fn add_constant(&mut self, value: Value, meta: NodeMetadata) -> Result<NodeId, ComputationError> {
        let idx = self.constants_data.len() as u32;
        let id = self.add_node(NodeKind::Constant(idx), CacheScope::Run, &[], meta)?;
        self.constants_data.push(value);
        Ok(id)
    }

    pub fn add_formula(
        &mut self,
        op: Operation,
        scope: CacheScope,
        parents: &[NodeId],
        meta: NodeMetadata,
    ) -> Result<NodeId, ComputationError> {
        if parents.len() != op.arity() {
            return Err(ComputationError::ParentCountMismatch {
                node_name: meta.name,
                expected: op.arity(),
                actual: parents.len(),
            });
        }
        self.add_node(NodeKind::Formula(op), scope, parents, meta)
    }

    pub fn add_equation(
        &mut self,
        equation: EquationFn,
        scope: CacheScope,
        parents: &[NodeId],
        meta: NodeMetadata,
    ) -> Result<NodeId, ComputationError> {
        let idx = self.equations.len() as u32;
        let id = self.add_node(NodeKind::Equation(idx), scope, parents, meta)?;
        self.equations.push(equation);
        Ok(id)
    }

    pub fn add_stock(&mut self, scope: CacheScope, meta: NodeMetadata) -> Result<NodeId, ComputationError> {
        let idx = self.stocks.len() as u32;
        let id = self.add_node(NodeKind::Stock(idx), scope, &[], meta)?;
        self.stocks.push(StockDef { node: id, rate: None, initial: None });
        Ok(id)
    }

    pub fn bind_stock(&mut self, stock: NodeId, rate: NodeId, initial: StockInit) -> Result<(), ComputationError> {
        let idx = self.stock_index(stock).ok_or(ComputationError::InvalidNode(stock))?;
        if rate.index() >= self.count() {
            return Err(ComputationError::InvalidNode(rate));
        }
        if let StockInit::Node(init) = &initial {
            if init.index() >= self.count() {
                return Err(ComputationError::InvalidNode(*init));
            }
        }
        let def = &mut self.stocks[idx];
        def.rate = Some(rate);
        def.initial = Some(initial);
        Ok(())
    }

    pub fn add_alias(&mut self, alias: &str, id: NodeId) -> Result<(), ComputationError> {
        if self.names.contains_key(alias) || self.aliases.contains_key(alias) {
            return Err(ComputationError::DuplicateName(alias.to_string()));
        }
        self.aliases.insert(alias.to_string(), id);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).or_else(|| self.aliases.get(name)).copied()
    }

    pub fn stock_index(&self, id: NodeId) -> Option<usize> {
        match self.kinds.get(id.index())? {
            NodeKind::Stock(idx) => Some(*idx as usize),
            _ => None,
        }
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.meta.get(id.index()).map(|m| m.name.as_str()).unwrap_or("<unknown>")
    }

    #[inline(always)]
    pub fn get_parents(&self, id: NodeId) -> &[NodeId] {
        let (start, count) = self.parents_ranges[id.index()];
        &self.parents_flat[start as usize..(start + count) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_rejected() {
        let mut reg = Registry::new();
        reg.add_constant(Value::Scalar(1.0), "a".into()).unwrap();
        let err = reg.add_constant(Value::Scalar(2.0), "a".into()).unwrap_err();
        assert_eq!(err, ComputationError::DuplicateName("a".into()));
    }

    #[test]
    fn test_real_name_is_an_alias() {
        let mut reg = Registry::new();
        let id = reg
            .add_constant(Value::Scalar(0.03), NodeMetadata::new("growth_fraction").with_real_name("Growth Fraction"))
            .unwrap();
        assert_eq!(reg.lookup("growth_fraction"), Some(id));
        assert_eq!(reg.lookup("Growth Fraction"), Some(id));
        assert_eq!(reg.lookup("growth fraction"), None);
    }

    #[test]
    fn test_real_name_collisions_rejected() {
        let mut reg = Registry::new();
        let first = reg.add_constant(Value::Scalar(1.0), NodeMetadata::new("a").with_real_name("X")).unwrap();
        let err = reg
            .add_constant(Value::Scalar(2.0), NodeMetadata::new("b").with_real_name("X"))
            .unwrap_err();
        assert_eq!(err, ComputationError::DuplicateName("X".into()));
        assert_eq!(reg.lookup("X"), Some(first));
        assert_eq!(reg.lookup("b"), None);

        // A real name may not shadow another quantity's identifier either.
        let err = reg
            .add_constant(Value::Scalar(3.0), NodeMetadata::new("c").with_real_name("a"))
            .unwrap_err();
        assert_eq!(err, ComputationError::DuplicateName("a".into()));
        assert_eq!(reg.count(), 1);
        assert!(reg.add_constant(Value::Scalar(4.0), NodeMetadata::new("d").with_real_name("d")).is_ok());
    }

    #[test]
    fn test_formula_arity_checked() {
        let mut reg = Registry::new();
        let a = reg.add_constant(Value::Scalar(1.0), "a".into()).unwrap();
        let err = reg.add_formula(Operation::Add, CacheScope::Step, &[a], "b".into()).unwrap_err();
        assert!(matches!(err, ComputationError::ParentCountMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let mut reg = Registry::new();
        let err = reg
            .add_formula(Operation::Identity, CacheScope::Step, &[NodeId(7)], "b".into())
            .unwrap_err();
        assert_eq!(err, ComputationError::InvalidNode(NodeId(7)));
    }

    #[test]
    fn test_bind_stock_requires_stock_node() {
        let mut reg = Registry::new();
        let a = reg.add_constant(Value::Scalar(1.0), "a".into()).unwrap();
        let s = reg.add_stock(CacheScope::Step, "s".into()).unwrap();
        assert!(reg.bind_stock(a, a, StockInit::from(0.0)).is_err());
        reg.bind_stock(s, a, StockInit::from(5.0)).unwrap();
        assert_eq!(reg.stocks[0].rate, Some(a));
        assert_eq!(reg.stock_index(s), Some(0));
    }
}
