use crate::compute::ledger::{ComputationError, Value};
use crate::store::Operation;
use std::fmt;
use std::sync::Arc;

/// A user-supplied equation. Receives its parents' values in declaration order.
pub trait Equation: Send + Sync {
    fn evaluate(&self, inputs: &[Value]) -> Result<Value, ComputationError>;
}

impl<F> Equation for F
where
    F: Fn(&[Value]) -> Result<Value, ComputationError> + Send + Sync,
{
    fn evaluate(&self, inputs: &[Value]) -> Result<Value, ComputationError> {
        self(inputs)
    }
}

/// Shared handle to an equation, so a `Model` can be read from several runs at once.
#[derive(Clone)]
pub struct EquationFn(pub Arc<dyn Equation>);

impl EquationFn {
    pub fn new(equation: impl Equation + 'static) -> Self {
        Self(Arc::new(equation))
    }
}

impl fmt::Debug for EquationFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EquationFn(..)")
    }
}

impl PartialEq for EquationFn {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Evaluates a built-in operation over already-computed parent values.
pub fn execute(op: Operation, args: &[Value], node_name: &str) -> Result<Value, ComputationError> {
    if args.len() != op.arity() {
        return Err(ComputationError::ParentCountMismatch {
            node_name: node_name.to_string(),
            expected: op.arity(),
            actual: args.len(),
        });
    }
    match op {
        Operation::Identity => Ok(args[0].clone()),
        Operation::Add => broadcast(&args[0], &args[1], node_name, |l, r| Ok(l + r)),
        Operation::Subtract => broadcast(&args[0], &args[1], node_name, |l, r| Ok(l - r)),
        Operation::Multiply => broadcast(&args[0], &args[1], node_name, |l, r| Ok(l * r)),
        Operation::Divide => broadcast(&args[0], &args[1], node_name, |l, r| {
            if r == 0.0 {
                return Err(ComputationError::DivisionByZero { node_name: node_name.to_string() });
            }
            Ok(l / r)
        }),
    }
}

/// Applies `f` elementwise. A scalar operand is repeated against an array;
/// two arrays must have the same length.
pub fn broadcast(
    lhs: &Value,
    rhs: &Value,
    node_name: &str,
    mut f: impl FnMut(f64, f64) -> Result<f64, ComputationError>,
) -> Result<Value, ComputationError> {
    if let (Value::Scalar(l), Value::Scalar(r)) = (lhs, rhs) {
        return Ok(Value::Scalar(f(*l, *r)?));
    }
    if let (Value::Array(l), Value::Array(r)) = (lhs, rhs) {
        if l.len() != r.len() {
            return Err(ComputationError::ShapeMismatch {
                node_name: node_name.to_string(),
                lhs: l.len(),
                rhs: r.len(),
            });
        }
    }
    // At least one side is an array here, and its length wins (empty stays empty).
    let len = match (lhs, rhs) {
        (Value::Array(l), _) => l.len(),
        (_, r) => r.len(),
    };
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        out.push(f(lhs.get_at(i), rhs.get_at(i))?);
    }
    Ok(Value::from(out))
}
