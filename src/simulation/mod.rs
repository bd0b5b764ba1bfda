//! Drives runs of a model: clock, configuration, result collection and scenarios.
pub mod clock;
pub mod config;
pub mod driver;
pub mod results;
pub mod scenario;

pub use clock::Clock;
pub use config::{ConfigError, SimulationConfig};
pub use driver::Simulation;
pub use results::SimulationResults;
pub use scenario::{run_scenarios, Scenario, ScenarioOutcome};
