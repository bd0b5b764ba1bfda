//! Exponential population growth with a fixed growth fraction, in months.

use crate::compute::ledger::ComputationError;
use crate::model::{Model, ModelBuilder};
use crate::simulation::config::SimulationConfig;
use crate::store::{CacheScope, NodeMetadata, Operation};

pub fn config() -> SimulationConfig {
    SimulationConfig::new(1.0, 13.0, 0.25).with_time_units("Months")
}

pub fn build() -> Result<Model, ComputationError> {
    let mut b = ModelBuilder::new(config())?;

    let growth_fraction = b.constant(
        NodeMetadata::new("growth_fraction").with_real_name("Growth Fraction"),
        0.03,
    )?;
    let population = b.stock(
        NodeMetadata::new("population").with_real_name("Population"),
        CacheScope::Step,
    )?;
    let additions = b.formula(
        NodeMetadata::new("additions").with_real_name("Additions"),
        CacheScope::Step,
        Operation::Multiply,
        &[growth_fraction, population],
    )?;
    b.bind_stock(population, additions, 1000.0)?;

    b.build()
}
