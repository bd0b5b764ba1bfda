//! Forward-Euler state for a single stock.

use crate::compute::kernel;
use crate::compute::ledger::{ComputationError, Value};

/// Run-time state of one stock. The binding to its rate and initial value lives
/// in the model (`StockDef`); this only holds what changes during a run.
#[derive(Debug, Clone, Default)]
pub struct Integrator {
    name: String,
    value: Option<Value>,
    /// Step in which `step_forward` last ran.
    advanced_at: Option<u64>,
}

impl Integrator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), value: None, advanced_at: None }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn is_initialized(&self) -> bool { self.value.is_some() }

    pub fn initialize(&mut self, value: Value) {
        self.value = Some(value);
        self.advanced_at = None;
    }

    /// Forgets the value; the stock must be initialized again before it is read.
    pub fn reset(&mut self) {
        self.value = None;
        self.advanced_at = None;
    }

    pub fn current_value(&self) -> Result<&Value, ComputationError> {
        self.value
            .as_ref()
            .ok_or_else(|| ComputationError::StockUninitialized(self.name.clone()))
    }

    /// Computes `previous + rate * dt` without applying it.
    pub fn integrate(&self, rate: &Value, dt: f64, step: u64) -> Result<Value, ComputationError> {
        if self.advanced_at == Some(step) {
            return Err(ComputationError::StockAlreadyAdvanced { stock: self.name.clone(), step });
        }
        let previous = self.current_value()?;
        kernel::broadcast(previous, rate, &self.name, |v, r| Ok(v + r * dt))
    }

    /// Stores a value produced by `integrate` for `step`.
    pub fn commit(&mut self, next: Value, step: u64) {
        self.value = Some(next);
        self.advanced_at = Some(step);
    }

    /// One Euler step. The stock is left untouched if anything fails.
    pub fn step_forward(&mut self, rate: &Value, dt: f64, step: u64) -> Result<(), ComputationError> {
        let next = self.integrate(rate, dt, step)?;
        self.commit(next, step);
        Ok(())
    }
}
