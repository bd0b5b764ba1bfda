//! Independent runs of one model with different parameters, executed in parallel.
//! Each scenario gets its own `Simulation`; only the immutable `Model` is shared.

use crate::compute::ledger::{ComputationError, Value};
use crate::model::Model;
use crate::simulation::config::ConfigError;
use crate::simulation::results::SimulationResults;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default)]
    pub return_columns: Option<Vec<String>>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Parses a JSON array of scenarios.
    pub fn load_all(json: &str) -> Result<Vec<Scenario>, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn run(&self, model: &Model) -> Result<SimulationResults, ComputationError> {
        let mut sim = model.simulation();
        for (name, value) in &self.params {
            sim.set_param(name, value.clone())?;
        }
        if let Some(columns) = &self.return_columns {
            sim.set_return_columns(columns)?;
        }
        sim.run()
    }
}

#[derive(Debug)]
pub struct ScenarioOutcome {
    pub name: String,
    pub result: Result<SimulationResults, ComputationError>,
}

/// Runs every scenario and returns the outcomes in input order.
pub fn run_scenarios(model: &Model, scenarios: &[Scenario]) -> Vec<ScenarioOutcome> {
    scenarios
        .par_iter()
        .map(|scenario| {
            info!(scenario = %scenario.name, params = scenario.params.len(), "scenario started");
            ScenarioOutcome { name: scenario.name.clone(), result: scenario.run(model) }
        })
        .collect()
}
