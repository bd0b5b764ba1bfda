//! The driver interface: one `Simulation` is one run context over a shared `Model`.

use crate::compute::engine::{Engine, RunPhase, RunState};
use crate::compute::ledger::{CacheStats, ComputationError, Value};
use crate::display::trace;
use crate::model::Model;
use crate::simulation::clock::Clock;
use crate::simulation::config::SimulationConfig;
use crate::simulation::results::SimulationResults;
use crate::store::{NodeId, NodeKind};
use tracing::{debug, info};

pub struct Simulation<'m> {
    model: &'m Model,
    engine: Engine<'m>,
    state: RunState,
    return_columns: Option<Vec<NodeId>>,
}

impl<'m> Simulation<'m> {
    pub fn new(model: &'m Model) -> Self {
        let registry = model.registry();
        Self {
            model,
            engine: Engine::new(registry),
            state: RunState::new(registry, Clock::new(model.config())),
            return_columns: None,
        }
    }

    pub fn model(&self) -> &'m Model { self.model }

    /// Starts a fresh run: clock back to the initial time, caches cleared, every
    /// stock set from its initial value.
    pub fn initialize_run(&mut self) -> Result<(), ComputationError> {
        let config = self.effective_config()?;
        self.state.clock = Clock::new(&config);
        info!(
            initial_time = config.initial_time,
            final_time = config.final_time,
            time_step = config.time_step,
            overrides = self.state.overrides.len(),
            "run initialized"
        );
        self.engine.initialize(&mut self.state)
    }

    /// Integrates every stock over `dt` and moves the clock forward.
    pub fn advance_step(&mut self, dt: f64) -> Result<(), ComputationError> {
        self.engine.advance(&mut self.state, dt)
    }

    pub fn read(&mut self, name: &str) -> Result<Value, ComputationError> {
        let id = self.model.resolve(name)?;
        self.read_id(id)
    }

    pub fn read_id(&mut self, id: NodeId) -> Result<Value, ComputationError> {
        self.engine.read(id, &mut self.state)
    }

    pub fn current_time(&self) -> f64 { self.state.clock.time() }
    pub fn current_step(&self) -> u64 { self.state.clock.step() }
    pub fn is_finished(&self) -> bool { self.state.clock.is_finished() }

    /// Replaces a quantity's equation with a fixed value. Takes effect from the
    /// next `initialize_run`; reads fail until then.
    pub fn set_param(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ComputationError> {
        let id = self.model.resolve(name)?;
        match self.model.registry().kinds[id.index()] {
            NodeKind::Stock(_) | NodeKind::Time => {
                return Err(ComputationError::NotOverridable(name.to_string()));
            }
            _ => {}
        }
        let value = value.into();
        debug!(param = name, ?value, "parameter overridden");
        self.state.overrides.insert(id, value);
        self.state.phase = RunPhase::Idle;
        Ok(())
    }

    /// The model's clock constants with any overrides of `initial_time`,
    /// `final_time`, `time_step` or `saveper` applied.
    pub fn effective_config(&self) -> Result<SimulationConfig, ComputationError> {
        let base = self.model.config();
        let mut config = SimulationConfig::new(
            self.control_override("initial_time")?.unwrap_or(base.initial_time),
            self.control_override("final_time")?.unwrap_or(base.final_time),
            self.control_override("time_step")?.unwrap_or(base.time_step),
        );
        config.saveper = self.control_override("saveper")?.or(base.saveper);
        config.time_units = base.time_units.clone();
        config.validate()?;
        Ok(config)
    }

    fn control_override(&self, name: &str) -> Result<Option<f64>, ComputationError> {
        let id = self.model.resolve(name)?;
        match self.state.overrides.get(&id) {
            None => Ok(None),
            Some(Value::Scalar(v)) => Ok(Some(*v)),
            Some(Value::Array(_)) => Err(ComputationError::InvalidDefinition {
                node_name: name.to_string(),
                message: "clock constants must be scalars".into(),
            }),
        }
    }

    pub fn clear_params(&mut self) {
        self.state.overrides.clear();
        self.state.phase = RunPhase::Idle;
    }

    /// Chooses what `run` records. Defaults to every user-defined quantity.
    pub fn set_return_columns<I, S>(&mut self, names: I) -> Result<(), ComputationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = names
            .into_iter()
            .map(|n| self.model.resolve(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.return_columns = Some(ids);
        Ok(())
    }

    /// Runs from the initial to the final time with the model's time step,
    /// recording the return columns at every save interval.
    pub fn run(&mut self) -> Result<SimulationResults, ComputationError> {
        self.initialize_run()?;

        let columns = self.return_columns.clone().unwrap_or_else(|| self.model.quantities());
        let registry = self.model.registry();
        let mut results = SimulationResults::new(columns.iter().map(|&id| registry.name(id).to_string()).collect());
        let config = self.effective_config()?;
        let stride = config.save_stride();
        let dt = config.time_step;

        loop {
            if self.current_step() % stride == 0 {
                let row = columns
                    .iter()
                    .map(|&id| self.engine.read(id, &mut self.state))
                    .collect::<Result<Vec<_>, _>>()?;
                results.push(self.current_time(), row);
            }
            if self.is_finished() {
                break;
            }
            self.advance_step(dt)?;
        }

        info!(rows = results.len(), time = self.current_time(), "run complete");
        Ok(results)
    }

    pub fn cache_stats(&self) -> CacheStats { self.state.ledger.stats() }

    /// Dependency tree of `name` with the values currently cached.
    pub fn trace(&self, name: &str) -> Result<String, ComputationError> {
        let id = self.model.resolve(name)?;
        Ok(trace::format_trace(self.model.registry(), &self.state, id))
    }
}
