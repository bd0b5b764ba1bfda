//! The model-load interface: a builder that assembles the equation graph, and the
//! immutable `Model` it produces.

use crate::analysis::{topology, validation, ValidationError};
use crate::compute::kernel::EquationFn;
use crate::compute::ledger::{ComputationError, Value};
use crate::simulation::config::{ConfigError, SimulationConfig};
use crate::simulation::Simulation;
use crate::store::{CacheScope, NodeId, NodeKind, NodeMetadata, Operation, Registry, StockInit};

/// A validated, acyclic equation graph plus its clock constants.
/// Holds no run state, so one model can back any number of simulations.
#[derive(Debug, Clone)]
pub struct Model {
    registry: Registry,
    config: SimulationConfig,
    order: Vec<NodeId>,
    /// `time` and the clock constants; left out of default result columns.
    builtins: Vec<NodeId>,
}

impl Model {
    pub fn registry(&self) -> &Registry { &self.registry }
    pub fn config(&self) -> &SimulationConfig { &self.config }

    /// Dependencies-first order of every node.
    pub fn evaluation_order(&self) -> &[NodeId] { &self.order }

    /// Looks a quantity up by identifier or by its real name.
    pub fn resolve(&self, name: &str) -> Result<NodeId, ComputationError> {
        self.registry
            .lookup(name)
            .ok_or_else(|| ComputationError::UnknownQuantity(name.to_string()))
    }

    pub fn metadata(&self, id: NodeId) -> Option<&NodeMetadata> {
        self.registry.meta.get(id.index())
    }

    /// Every user-defined quantity, in declaration order.
    pub fn quantities(&self) -> Vec<NodeId> {
        (0..self.registry.count())
            .map(NodeId::new)
            .filter(|id| !self.builtins.contains(id))
            .collect()
    }

    pub fn stocks(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.registry.stocks.iter().map(|def| def.node)
    }

    /// Lints cache scopes. See `analysis::validation`.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        validation::check_scopes(&self.registry, &self.order)
    }

    pub fn simulation(&self) -> Simulation<'_> {
        Simulation::new(self)
    }
}

pub struct ModelBuilder {
    registry: Registry,
    config: SimulationConfig,
    builtins: Vec<NodeId>,
}

impl ModelBuilder {
    /// Starts a model with the `time` node and the clock constants already registered.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut builder = Self { registry: Registry::new(), config, builtins: Vec::new() };
        builder.register_builtins().map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(builder)
    }

    fn register_builtins(&mut self) -> Result<(), ComputationError> {
        let time = self.registry.add_node(
            NodeKind::Time,
            CacheScope::None,
            &[],
            NodeMetadata::new("time").with_real_name("TIME"),
        )?;
        self.registry.add_alias("Time", time)?;
        self.builtins.push(time);

        let controls = [
            ("initial_time", "INITIAL TIME", self.config.initial_time, "The initial time for the simulation."),
            ("final_time", "FINAL TIME", self.config.final_time, "The final time for the simulation."),
            ("time_step", "TIME STEP", self.config.time_step, "The time step for the simulation."),
        ];
        for (name, real_name, value, doc) in controls {
            let meta = self.control_meta(name, real_name, doc);
            let id = self.registry.add_constant(Value::Scalar(value), meta)?;
            self.builtins.push(id);
        }

        // Without an explicit save interval, output follows the time step.
        let meta = self.control_meta("saveper", "SAVEPER", "The frequency with which output is stored.");
        let saveper = match self.config.saveper {
            Some(value) => self.registry.add_constant(Value::Scalar(value), meta)?,
            None => {
                let time_step = self.builtins[3];
                self.registry.add_formula(Operation::Identity, CacheScope::Run, &[time_step], meta)?
            }
        };
        self.builtins.push(saveper);
        Ok(())
    }

    fn control_meta(&self, name: &str, real_name: &str, doc: &str) -> NodeMetadata {
        let meta = NodeMetadata::new(name).with_real_name(real_name).with_doc(doc);
        match &self.config.time_units {
            Some(u) => meta.with_unit(u.clone()),
            None => meta,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.registry.lookup(name)
    }

    pub fn time(&self) -> NodeId {
        self.builtins[0]
    }

    /// A run-scoped constant.
    pub fn constant(
        &mut self,
        meta: impl Into<NodeMetadata>,
        value: impl Into<Value>,
    ) -> Result<NodeId, ComputationError> {
        self.registry.add_constant(value.into(), meta.into())
    }

    pub fn formula(
        &mut self,
        meta: impl Into<NodeMetadata>,
        scope: CacheScope,
        op: Operation,
        parents: &[NodeId],
    ) -> Result<NodeId, ComputationError> {
        self.registry.add_formula(op, scope, parents, meta.into())
    }

    /// A node computed by `equation` from its parents' values, passed in the order given.
    pub fn equation<F>(
        &mut self,
        meta: impl Into<NodeMetadata>,
        scope: CacheScope,
        parents: &[NodeId],
        equation: F,
    ) -> Result<NodeId, ComputationError>
    where
        F: Fn(&[Value]) -> Result<Value, ComputationError> + Send + Sync + 'static,
    {
        self.registry.add_equation(EquationFn::new(equation), scope, parents, meta.into())
    }

    /// Declares a stock. Its rate and initial value are attached with `bind_stock`,
    /// which allows the rate to depend on the stock.
    pub fn stock(&mut self, meta: impl Into<NodeMetadata>, scope: CacheScope) -> Result<NodeId, ComputationError> {
        self.registry.add_stock(scope, meta.into())
    }

    pub fn bind_stock(
        &mut self,
        stock: NodeId,
        rate: NodeId,
        initial: impl Into<StockInit>,
    ) -> Result<(), ComputationError> {
        self.registry.bind_stock(stock, rate, initial.into())
    }

    /// Checks stock bindings and rejects cycles.
    pub fn build(self) -> Result<Model, ComputationError> {
        if let Some(def) = self.registry.stocks.iter().find(|d| d.rate.is_none() || d.initial.is_none()) {
            return Err(ComputationError::UnboundStock(self.registry.name(def.node).to_string()));
        }
        let order = topology::sort(&self.registry)?;
        Ok(Model { registry: self.registry, config: self.config, order, builtins: self.builtins })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ModelBuilder {
        ModelBuilder::new(SimulationConfig::new(0.0, 10.0, 1.0).with_time_units("Days")).unwrap()
    }

    #[test]
    fn test_builtins_registered() {
        let model = builder().build().unwrap();
        assert_eq!(model.resolve("TIME").unwrap(), model.resolve("time").unwrap());
        assert_eq!(model.resolve("Time").unwrap(), model.resolve("time").unwrap());
        let step = model.resolve("TIME STEP").unwrap();
        assert_eq!(model.metadata(step).unwrap().unit.as_ref().unwrap().0, "Days");
        assert!(model.quantities().is_empty());
    }

    #[test]
    fn test_saveper_follows_time_step_unless_given() {
        let model = builder().build().unwrap();
        let saveper = model.resolve("saveper").unwrap();
        assert!(matches!(model.registry().kinds[saveper.index()], NodeKind::Formula(Operation::Identity)));
        let mut sim = model.simulation();
        sim.initialize_run().unwrap();
        assert_eq!(sim.read("SAVEPER").unwrap(), Value::Scalar(1.0));

        let fixed = ModelBuilder::new(SimulationConfig::new(0.0, 10.0, 1.0).with_saveper(2.0))
            .unwrap()
            .build()
            .unwrap();
        let mut sim = fixed.simulation();
        sim.initialize_run().unwrap();
        assert_eq!(sim.read("saveper").unwrap(), Value::Scalar(2.0));
    }

    #[test]
    fn test_unbound_stock_rejected() {
        let mut b = builder();
        b.stock("inventory", CacheScope::Step).unwrap();
        let err = b.build().unwrap_err();
        assert_eq!(err, ComputationError::UnboundStock("inventory".into()));
    }

    #[test]
    fn test_name_clash_with_builtin() {
        let mut b = builder();
        assert_eq!(b.constant("time", 1.0).unwrap_err(), ComputationError::DuplicateName("time".into()));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(ModelBuilder::new(SimulationConfig::new(0.0, 10.0, 0.0)).is_err());
    }

    #[test]
    fn test_unknown_quantity() {
        let model = builder().build().unwrap();
        assert_eq!(model.resolve("nope").unwrap_err(), ComputationError::UnknownQuantity("nope".into()));
    }

    #[test]
    fn test_validate_flags_run_scope_reading_time() {
        let mut b = builder();
        let time = b.time();
        b.formula("frozen_time", CacheScope::Run, Operation::Identity, &[time]).unwrap();
        let model = b.build().unwrap();
        let errors = model.validate().unwrap_err();
        assert_eq!(errors[0].node_name, "frozen_time");
    }
}
