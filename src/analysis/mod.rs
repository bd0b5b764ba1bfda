//! Graph analysis: evaluation order, cycle detection and cache-scope lints.
pub mod topology;
pub mod validation;

pub use validation::{ValidationError, ValidationErrorType};
