//! Ready-made models.
pub mod population;
