//! A synchronous, single-threaded evaluation engine.
//!
//! Reads are pull-based: a node's parents are read (through the ledger) before its
//! own equation runs. Stocks end the recursion, since their value is whatever the
//! integrator holds for the current step.

use crate::compute::integrator::Integrator;
use crate::compute::kernel;
use crate::compute::ledger::{ComputationError, Ledger, Value};
use crate::simulation::clock::Clock;
use crate::store::{NodeId, NodeKind, Registry, StockInit};
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// No run in progress, or parameters changed since the last initialization.
    Idle,
    /// Stocks are being initialized; reading an uninitialized stock initializes it.
    Initializing,
    Running,
}

/// Everything that belongs to one simulation run.
#[derive(Debug, Clone)]
pub struct RunState {
    pub ledger: Ledger,
    pub stocks: Vec<Integrator>,
    pub clock: Clock,
    /// Fixed values replacing a node's equation.
    pub overrides: HashMap<NodeId, Value>,
    pub phase: RunPhase,
}

impl RunState {
    pub fn new(registry: &Registry, clock: Clock) -> Self {
        let mut ledger = Ledger::new();
        ledger.ensure_capacity(registry.count());
        let stocks = registry
            .stocks
            .iter()
            .map(|def| Integrator::new(registry.name(def.node)))
            .collect();
        Self { ledger, stocks, clock, overrides: HashMap::new(), phase: RunPhase::Idle }
    }
}

pub struct Engine<'a> {
    registry: &'a Registry,
}

impl<'a> Engine<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Resets the clock and caches, then initializes every stock.
    pub fn initialize(&self, state: &mut RunState) -> Result<(), ComputationError> {
        state.clock.reset();
        state.ledger.clear();
        state.stocks.iter_mut().for_each(Integrator::reset);
        state.phase = RunPhase::Initializing;

        for idx in 0..state.stocks.len() {
            if state.stocks[idx].is_initialized() {
                continue; // pulled in by an earlier stock's initial value
            }
            if let Err(e) = self.initialize_stock(idx, state) {
                state.phase = RunPhase::Idle;
                return Err(e);
            }
        }

        state.phase = RunPhase::Running;
        Ok(())
    }

    /// Returns the node's value for the current step, computing it on a cache miss.
    pub fn read(&self, node_id: NodeId, state: &mut RunState) -> Result<Value, ComputationError> {
        if state.phase == RunPhase::Idle {
            return Err(ComputationError::RunNotInitialized);
        }
        self.read_node(node_id, state)
    }

    /// Advances every stock by one Euler step of size `dt`, then moves the clock.
    ///
    /// All rates are evaluated before any stock changes, so every rate sees the
    /// values as of the start of the step. On error nothing is applied.
    pub fn advance(&self, state: &mut RunState, dt: f64) -> Result<(), ComputationError> {
        if state.phase != RunPhase::Running {
            return Err(ComputationError::RunNotInitialized);
        }
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ComputationError::InvalidTimeStep(dt));
        }
        if state.clock.is_finished() {
            return Err(ComputationError::RunFinished { time: state.clock.time() });
        }

        let step = state.clock.step();
        let mut next = Vec::with_capacity(self.registry.stocks.len());
        for (idx, def) in self.registry.stocks.iter().enumerate() {
            let rate_id = def
                .rate
                .ok_or_else(|| ComputationError::UnboundStock(self.registry.name(def.node).to_string()))?;
            let rate = self.read_node(rate_id, state)?;
            next.push(state.stocks[idx].integrate(&rate, dt, step)?);
        }

        for (integrator, value) in state.stocks.iter_mut().zip(next) {
            integrator.commit(value, step);
        }
        state.clock.advance(dt);
        trace!(time = state.clock.time(), step = state.clock.step(), "step advanced");
        Ok(())
    }

    fn read_node(&self, node_id: NodeId, state: &mut RunState) -> Result<Value, ComputationError> {
        let scope = *self
            .registry
            .scopes
            .get(node_id.index())
            .ok_or(ComputationError::InvalidNode(node_id))?;
        let step = state.clock.step();

        if let Some(value) = state.ledger.lookup(node_id, scope, step) {
            return Ok(value);
        }

        trace!(node = self.registry.name(node_id), %scope, step, "cache miss");
        // An error leaves the slot empty so a later read retries.
        let value = self.evaluate(node_id, state)?;
        state.ledger.insert(node_id, scope, step, value.clone());
        Ok(value)
    }

    fn evaluate(&self, node_id: NodeId, state: &mut RunState) -> Result<Value, ComputationError> {
        if let Some(fixed) = state.overrides.get(&node_id) {
            return Ok(fixed.clone());
        }

        match &self.registry.kinds[node_id.index()] {
            NodeKind::Constant(idx) => Ok(self.registry.constants_data[*idx as usize].clone()),
            NodeKind::Formula(op) => {
                let args = self.gather_parents(node_id, state)?;
                kernel::execute(*op, &args, self.registry.name(node_id))
            }
            NodeKind::Equation(idx) => {
                let args = self.gather_parents(node_id, state)?;
                self.registry.equations[*idx as usize].0.evaluate(&args)
            }
            NodeKind::Stock(idx) => self.stock_value(*idx as usize, state),
            NodeKind::Time => Ok(Value::Scalar(state.clock.time())),
        }
    }

    fn gather_parents(
        &self,
        node_id: NodeId,
        state: &mut RunState,
    ) -> Result<SmallVec<[Value; 4]>, ComputationError> {
        self.registry
            .get_parents(node_id)
            .iter()
            .map(|&parent| self.read_node(parent, state))
            .collect()
    }

    fn stock_value(&self, idx: usize, state: &mut RunState) -> Result<Value, ComputationError> {
        if !state.stocks[idx].is_initialized() && state.phase == RunPhase::Initializing {
            self.initialize_stock(idx, state)?;
        }
        state.stocks[idx].current_value().cloned()
    }

    fn initialize_stock(&self, idx: usize, state: &mut RunState) -> Result<(), ComputationError> {
        let def = &self.registry.stocks[idx];
        let name = self.registry.name(def.node);
        let value = match def.initial.as_ref() {
            Some(StockInit::Value(v)) => v.clone(),
            Some(StockInit::Node(init)) => self.read_node(*init, state)?,
            None => return Err(ComputationError::UnboundStock(name.to_string())),
        };
        debug!(stock = name, ?value, "stock initialized");
        state.stocks[idx].initialize(value);
        Ok(())
    }
}
