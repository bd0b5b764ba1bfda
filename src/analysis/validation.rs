//! Static checks over a built model. These never run implicitly; the engine
//! evaluates whatever it is given.
use crate::store::{CacheScope, NodeId, NodeKind, Registry};

/// The specific category of a validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorType {
    /// A run-scoped node whose value changes during a run; its cache goes stale.
    StaleRunCache,
}

/// A structured error report from the static analysis pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub node_id: NodeId,
    pub node_name: String,
    pub error_type: ValidationErrorType,
    pub message: String,
}

/// Reports every run-scoped node that is time-varying: `time` itself, a stock,
/// or anything reading one of those. `order` must be a topological order.
pub fn check_scopes(registry: &Registry, order: &[NodeId]) -> Result<(), Vec<ValidationError>> {
    // For each time-varying node, the node it inherits that from.
    let mut varies_via: Vec<Option<NodeId>> = vec![None; registry.count()];
    let mut errors = Vec::new();

    for &node in order {
        let idx = node.index();
        let source = match registry.kinds[idx] {
            NodeKind::Time | NodeKind::Stock(_) => Some(node),
            _ => registry
                .get_parents(node)
                .iter()
                .find(|p| varies_via[p.index()].is_some())
                .copied(),
        };
        varies_via[idx] = source;

        if let (CacheScope::Run, Some(source)) = (registry.scopes[idx], varies_via[idx]) {
            let name = registry.name(node).to_string();
            let message = if source == node {
                format!("'{}' changes during a run but is cached for the whole run", name)
            } else {
                format!(
                    "run-scoped '{}' depends on '{}', which changes during a run",
                    name,
                    registry.name(source)
                )
            };
            errors.push(ValidationError {
                node_id: node,
                node_name: name,
                error_type: ValidationErrorType::StaleRunCache,
                message,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
