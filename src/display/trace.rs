use crate::compute::engine::RunState;
use crate::compute::ledger::Value;
use crate::store::{NodeId, NodeKind, Operation, Registry};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the dependency tree under `target` with whatever the run currently
/// has cached. Nothing is evaluated, so this is safe to call after a failure.
pub fn format_trace(registry: &Registry, state: &RunState, target: NodeId) -> String {
    let mut tracer = Tracer {
        registry,
        state,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    if target.index() < registry.count() {
        let name = registry.name(target);
        let _ = writeln!(
            tracer.output,
            "TRACE for '{}' at time {} (step {}):",
            name,
            state.clock.time(),
            state.clock.step()
        );
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_node(target, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: Invalid Node ID {:?}", target);
    }
    tracer.output
}

struct Tracer<'a> {
    registry: &'a Registry,
    state: &'a RunState,
    visited_at_level: HashMap<NodeId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, node_id: NodeId, level: usize, prefix: &str) {
        let name = self.registry.name(node_id);
        if let Some(&first_seen) = self.visited_at_level.get(&node_id) {
            let _ = writeln!(self.output, "{}{} -> (Ref to L{})", prefix, name, first_seen);
            return;
        }
        self.visited_at_level.insert(node_id, level);

        let idx = node_id.index();
        let scope = self.registry.scopes[idx];
        let marker = if self.state.overrides.contains_key(&node_id) { " [OVERRIDE]" } else { "" };
        let header = format!("[L{}] {}{} ({}){}", level, name, self.format_value(node_id), scope, marker);

        match &self.registry.kinds[idx] {
            NodeKind::Constant(_) => {
                let _ = writeln!(self.output, "{}{} -> Constant", prefix, header);
            }
            NodeKind::Time => {
                let _ = writeln!(self.output, "{}{} -> Clock", prefix, header);
            }
            NodeKind::Stock(stock_idx) => {
                // The rate is a deferred dependency; it is not expanded here.
                let rate = self.registry.stocks[*stock_idx as usize]
                    .rate
                    .map(|r| self.registry.name(r).to_string())
                    .unwrap_or_else(|| "?".into());
                let _ = writeln!(self.output, "{}{} -> Stock(rate: {})", prefix, header, rate);
            }
            NodeKind::Formula(op) => {
                let parents = self.registry.get_parents(node_id);
                let formula = self.format_formula(*op, parents);
                let _ = writeln!(self.output, "{}{} = {}", prefix, header, formula);
                self.recurse_parents(prefix, parents, level);
            }
            NodeKind::Equation(_) => {
                let parents = self.registry.get_parents(node_id);
                let args: Vec<&str> = parents.iter().map(|&p| self.registry.name(p)).collect();
                let _ = writeln!(self.output, "{}{} = f({})", prefix, header, args.join(", "));
                self.recurse_parents(prefix, parents, level);
            }
        }
    }

    fn recurse_parents(&mut self, prefix: &str, parents: &[NodeId], level: usize) {
        let stem = self.build_child_stem(prefix);
        for (i, &parent) in parents.iter().enumerate() {
            let connector = if i == parents.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_node(parent, level + 1, &full_prefix);
        }
    }

    fn format_formula(&self, op: Operation, parents: &[NodeId]) -> String {
        match (op, parents) {
            (Operation::Identity, [only]) => self.registry.name(*only).to_string(),
            (_, [lhs, rhs]) => format!("{} {} {}", self.registry.name(*lhs), op.symbol(), self.registry.name(*rhs)),
            _ => op.symbol().to_string(),
        }
    }

    fn format_value(&self, id: NodeId) -> String {
        let idx = id.index();
        let cached = self.state.ledger.peek(id, self.registry.scopes[idx], self.state.clock.step());
        let value = match (&self.registry.kinds[idx], cached) {
            (_, Some(v)) => Some(v.clone()),
            (NodeKind::Time, None) => Some(Value::Scalar(self.state.clock.time())),
            (NodeKind::Stock(s), None) => self.state.stocks[*s as usize].current_value().ok().cloned(),
            _ => None,
        };
        match value {
            Some(Value::Scalar(s)) => format!(" [{:.3}]", s),
            Some(Value::Array(vec)) => match vec.first() {
                Some(first) if vec.len() > 1 => format!(" [{:.3}, ... len={}]", first, vec.len()),
                Some(first) => format!(" [{:.3}]", first),
                None => " []".to_string(),
            },
            None => " [--]".to_string(),
        }
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}

#[cfg(test)]
mod tests {
    use crate::models::population;

    #[test]
    fn test_trace_shows_cached_values_and_stops_at_stocks() {
        let model = population::build().unwrap();
        let mut sim = model.simulation();
        sim.initialize_run().unwrap();
        sim.read("additions").unwrap();

        let out = sim.trace("additions").unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "TRACE for 'additions' at time 1 (step 0):");
        assert_eq!(lines[2], "[L1] additions [30.000] (step) = growth_fraction * population");
        assert_eq!(lines[3], "|--[L2] growth_fraction [0.030] (run) -> Constant");
        assert_eq!(lines[4], "`--[L2] population [1000.000] (step) -> Stock(rate: additions)");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_trace_before_evaluation() {
        let model = population::build().unwrap();
        let sim = model.simulation();
        let out = sim.trace("additions").unwrap();
        assert!(out.contains("[L1] additions [--] (step)"), "{}", out);
    }
}
