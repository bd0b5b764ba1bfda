//! Evaluates the equation graph and integrates stocks.
pub mod engine;
pub mod integrator;
pub mod kernel;
pub mod ledger;

pub use engine::{Engine, RunPhase, RunState};
pub use integrator::Integrator;
pub use kernel::{Equation, EquationFn};
pub use ledger::{CacheStats, ComputationError, Ledger, Value};
