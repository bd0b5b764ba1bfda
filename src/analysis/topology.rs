use crate::compute::ledger::ComputationError;
use crate::store::{NodeId, Registry, StockInit};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

/// Builds the instantaneous dependency graph, with edges pointing parent -> consumer.
///
/// A stock's rate is not an edge: it is only read at step boundaries, against the
/// stock's previous value. A stock's initial value is an edge, since it must be
/// known before the stock can be read at all.
pub fn dependency_graph(registry: &Registry) -> DiGraph<NodeId, ()> {
    let count = registry.count();
    let mut graph = DiGraph::with_capacity(count, registry.parents_flat.len());
    for i in 0..count {
        graph.add_node(NodeId::new(i));
    }

    for i in 0..count {
        for &parent in registry.get_parents(NodeId::new(i)) {
            graph.add_edge(NodeIndex::new(parent.index()), NodeIndex::new(i), ());
        }
    }
    for def in &registry.stocks {
        if let Some(StockInit::Node(init)) = &def.initial {
            graph.add_edge(NodeIndex::new(init.index()), NodeIndex::new(def.node.index()), ());
        }
    }
    graph
}

/// Returns every node ordered so that dependencies come before their consumers.
pub fn sort(registry: &Registry) -> Result<Vec<NodeId>, ComputationError> {
    let graph = dependency_graph(registry);
    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|ix| graph[ix]).collect()),
        Err(cycle) => Err(ComputationError::CycleDetected {
            nodes: cycle_members(registry, &graph, cycle.node_id()),
        }),
    }
}

/// Names of the strongly connected component containing `start`.
fn cycle_members(registry: &Registry, graph: &DiGraph<NodeId, ()>, start: NodeIndex) -> Vec<String> {
    let mut members = tarjan_scc(graph)
        .into_iter()
        .find(|scc| scc.contains(&start))
        .unwrap_or_else(|| vec![start]);
    members.sort();
    members.into_iter().map(|ix| registry.name(graph[ix]).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ledger::Value;
    use crate::store::{CacheScope, Operation};

    #[test]
    fn test_sort_diamond_dependency() {
        // Shape: A -> B, A -> C, B+C -> D
        let mut reg = Registry::new();
        let a = reg.add_constant(Value::Scalar(1.0), "A".into()).unwrap();
        let b = reg.add_formula(Operation::Add, CacheScope::Step, &[a, a], "B".into()).unwrap();
        let c = reg.add_formula(Operation::Add, CacheScope::Step, &[a, a], "C".into()).unwrap();
        let d = reg.add_formula(Operation::Add, CacheScope::Step, &[b, c], "D".into()).unwrap();

        let res = sort(&reg).expect("Sort failed");

        let pos = |id: NodeId| res.iter().position(|&x| x == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(a) < pos(c));
        assert!(pos(b) < pos(d));
        assert!(pos(c) < pos(d));
    }

    #[test]
    fn test_feedback_through_stock_rate_is_allowed() {
        // population -> additions -> (rate of) population
        let mut reg = Registry::new();
        let gf = reg.add_constant(Value::Scalar(0.03), "growth_fraction".into()).unwrap();
        let pop = reg.add_stock(CacheScope::Step, "population".into()).unwrap();
        let add = reg.add_formula(Operation::Multiply, CacheScope::Step, &[gf, pop], "additions".into()).unwrap();
        reg.bind_stock(pop, add, StockInit::from(1000.0)).unwrap();

        let order = sort(&reg).unwrap();
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_initialization_cycle_detected() {
        // The stock's initial value depends on the stock itself.
        let mut reg = Registry::new();
        let s = reg.add_stock(CacheScope::Step, "s".into()).unwrap();
        let twice = reg.add_formula(Operation::Add, CacheScope::Run, &[s, s], "twice".into()).unwrap();
        reg.bind_stock(s, twice, StockInit::Node(twice)).unwrap();

        let err = sort(&reg).unwrap_err();
        assert_eq!(err, ComputationError::CycleDetected { nodes: vec!["s".into(), "twice".into()] });
    }

    #[test]
    fn test_cycle_detection_explicit() {
        // Construct A -> B. Then force B -> A via internal mutation.
        let mut reg = Registry::new();
        let a = reg.add_constant(Value::Scalar(0.0), "A".into()).unwrap();
        let b = reg.add_formula(Operation::Identity, CacheScope::Step, &[a], "B".into()).unwrap();

        assert_eq!(reg.parents_ranges[0].1, 0);
        reg.parents_flat.push(b);
        let new_start = (reg.parents_flat.len() - 1) as u32;
        reg.parents_ranges[0] = (new_start, 1);

        let err = sort(&reg).unwrap_err();
        assert!(err.to_string().contains("Cycle detected"), "Msg: {}", err);
    }
}
