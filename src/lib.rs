//! A system-dynamics simulation core.
//!
//! A model is an acyclic graph of named quantities. Each quantity carries a cache
//! scope (`run`, `step` or `none`) that controls how often it is recomputed, and
//! stocks are integrated with forward Euler steps driven by a shared clock.
//!
//! ```ignore
//! let model = stockflow_core::models::population::build()?;
//! let results = model.simulation().run()?;
//! println!("{}", results.to_json()?);
//! ```

pub mod analysis;
pub mod compute;
pub mod display;
pub mod model;
pub mod models;
pub mod simulation;
pub mod store;

pub use compute::{CacheStats, ComputationError, Equation, Value};
pub use model::{Model, ModelBuilder};
pub use simulation::{run_scenarios, Scenario, Simulation, SimulationConfig, SimulationResults};
pub use store::{CacheScope, NodeId, NodeMetadata, Operation, StockInit};
