//! Critical path length calculation.
//!
//! For every operation X:
//!
//! ```text
//! cpl(X) = effective_weight(X) + max(cpl(c) for c in consumers(X), default 0)
//! ```
//!
//! Computed by a depth-first traversal with memoization, so each edge is
//! walked at most once per analysis. Operations on the active DFS path are
//! tracked in a path set; reaching one of them again means the graph has a
//! cycle, which is diagnosed and fails the whole analysis.
//!
//! The traversal uses an explicit stack, so deep graphs cannot overflow the
//! call stack.

use crate::models::{OperationGraph, OperationId};

use super::diagnostics::diagnose_cycle;
use super::types::{AnalysisError, CriticalPathLengths};

/// One frame of the explicit DFS stack.
struct Frame {
    id: OperationId,
    /// Index of the next consumer to visit.
    next: usize,
    /// Greatest consumer length seen so far.
    max_consumer: u64,
}

impl Frame {
    fn new(id: OperationId) -> Self {
        Self {
            id,
            next: 0,
            max_consumer: 0,
        }
    }
}

/// Computes critical path lengths over one graph.
///
/// Results are cached in a side table owned by the analyzer, so repeated
/// `compute` calls only pay for operations not yet visited.
pub struct CriticalPathAnalyzer<'g> {
    graph: &'g OperationGraph,
    lengths: Vec<Option<u64>>,
    on_path: Vec<bool>,
}

impl<'g> CriticalPathAnalyzer<'g> {
    pub fn new(graph: &'g OperationGraph) -> Self {
        Self {
            graph,
            lengths: vec![None; graph.len()],
            on_path: vec![false; graph.len()],
        }
    }

    /// Compute the critical path length of every operation in `ops` (and of
    /// everything downstream of them).
    ///
    /// Returns `ops` in input order. IDs outside the graph are ignored.
    pub fn compute<I>(&mut self, ops: I) -> Result<Vec<OperationId>, AnalysisError>
    where
        I: IntoIterator<Item = OperationId>,
    {
        let mut visited = Vec::new();
        for id in ops {
            if self.graph.contains(id) {
                self.visit(id)?;
            }
            visited.push(id);
        }
        Ok(visited)
    }

    /// Memoized length for `id`, if already computed.
    #[inline]
    pub fn length(&self, id: OperationId) -> Option<u64> {
        self.lengths.get(id.index()).copied().flatten()
    }

    /// Finish the analysis, returning the table.
    ///
    /// Operations never reached by `compute` are analyzed here, so the table
    /// is always complete.
    pub fn into_lengths(mut self) -> Result<CriticalPathLengths, AnalysisError> {
        let graph = self.graph;
        self.compute(graph.ids())?;
        Ok(CriticalPathLengths::new(
            self.lengths.into_iter().map(|len| len.unwrap_or(0)).collect(),
        ))
    }

    fn visit(&mut self, root: OperationId) -> Result<u64, AnalysisError> {
        if let Some(len) = self.length(root) {
            return Ok(len);
        }

        let graph = self.graph;
        self.on_path[root.index()] = true;
        let mut stack = vec![Frame::new(root)];

        while let Some(frame) = stack.last_mut() {
            let consumers = graph.consumers(frame.id);

            if let Some(&consumer) = consumers.get(frame.next) {
                frame.next += 1;

                if self.on_path[consumer.index()] {
                    return Err(diagnose_cycle(graph, consumer)?.into());
                }
                if let Some(len) = self.lengths[consumer.index()] {
                    frame.max_consumer = frame.max_consumer.max(len);
                    continue;
                }

                self.on_path[consumer.index()] = true;
                stack.push(Frame::new(consumer));
                continue;
            }

            // All consumers done: settle this operation.
            let id = frame.id;
            let max_consumer = frame.max_consumer;
            stack.pop();

            self.on_path[id.index()] = false;
            let weight = graph.get(id).map_or(1, |op| op.effective_weight());
            let len = max_consumer.saturating_add(weight);
            self.lengths[id.index()] = Some(len);

            match stack.last_mut() {
                Some(parent) => parent.max_consumer = parent.max_consumer.max(len),
                None => return Ok(len),
            }
        }

        // The loop always returns once the root frame is settled.
        Ok(self.length(root).unwrap_or(0))
    }
}

/// Analyze every operation in `graph`.
///
/// Fails with [`AnalysisError::Cycle`] if any cycle is reachable.
pub fn compute_critical_path_lengths(
    graph: &OperationGraph,
) -> Result<CriticalPathLengths, AnalysisError> {
    CriticalPathAnalyzer::new(graph).into_lengths()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operation;

    /// Build a graph from `(dependency, consumer)` edges over named nodes.
    fn graph_of(nodes: &[(&str, u64)], edges: &[(&str, &str)]) -> OperationGraph {
        let mut graph = OperationGraph::new();
        for (name, weight) in nodes {
            graph
                .add_operation(Operation::named(*name).with_weight(*weight))
                .unwrap();
        }
        for (dep, consumer) in edges {
            let dep = graph.find(dep).unwrap();
            let consumer = graph.find(consumer).unwrap();
            graph.add_dependency(consumer, dep).unwrap();
        }
        graph
    }

    fn cpl(graph: &OperationGraph, lengths: &CriticalPathLengths, name: &str) -> u64 {
        lengths.get(graph.find(name).unwrap()).unwrap()
    }

    #[test]
    fn test_linear_chain() {
        let graph = graph_of(&[("a", 1), ("b", 1), ("c", 1)], &[("a", "b"), ("b", "c")]);
        let lengths = compute_critical_path_lengths(&graph).unwrap();

        assert_eq!(cpl(&graph, &lengths, "a"), 3);
        assert_eq!(cpl(&graph, &lengths, "b"), 2);
        assert_eq!(cpl(&graph, &lengths, "c"), 1);
    }

    #[test]
    fn test_diamond() {
        let graph = graph_of(
            &[("a", 1), ("b", 1), ("c", 1), ("d", 1)],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        );
        let lengths = compute_critical_path_lengths(&graph).unwrap();

        assert_eq!(cpl(&graph, &lengths, "a"), 3);
        assert_eq!(cpl(&graph, &lengths, "b"), 2);
        assert_eq!(cpl(&graph, &lengths, "c"), 2);
        assert_eq!(cpl(&graph, &lengths, "d"), 1);
    }

    #[test]
    fn test_weights_pick_heavier_branch() {
        // a feeds a light branch (b=2) and a heavy one (c=10); both feed d=1
        let graph = graph_of(
            &[("a", 3), ("b", 2), ("c", 10), ("d", 1)],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        );
        let lengths = compute_critical_path_lengths(&graph).unwrap();

        assert_eq!(cpl(&graph, &lengths, "d"), 1);
        assert_eq!(cpl(&graph, &lengths, "c"), 11);
        assert_eq!(cpl(&graph, &lengths, "b"), 3);
        assert_eq!(cpl(&graph, &lengths, "a"), 14);

        let chain: Vec<String> = lengths
            .critical_chain(&graph)
            .into_iter()
            .map(|id| graph.display_name(id))
            .collect();
        assert_eq!(chain, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_zero_weight_counts_as_one() {
        let graph = graph_of(&[("a", 0), ("b", 0)], &[("a", "b")]);
        let lengths = compute_critical_path_lengths(&graph).unwrap();

        assert_eq!(cpl(&graph, &lengths, "a"), 2);
        assert_eq!(cpl(&graph, &lengths, "b"), 1);
    }

    #[test]
    fn test_two_cycle() {
        let graph = graph_of(&[("a", 1), ("b", 1)], &[("a", "b"), ("b", "a")]);
        let err = compute_critical_path_lengths(&graph).unwrap_err();

        match err {
            AnalysisError::Cycle(cycle) => {
                let trace = cycle.trace();
                assert!(trace == "a -> b -> a" || trace == "b -> a -> b", "{trace}");
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_downstream_of_dag_part() {
        // root -> x -> y -> z -> x
        let graph = graph_of(
            &[("root", 1), ("x", 1), ("y", 1), ("z", 1)],
            &[("root", "x"), ("x", "y"), ("y", "z"), ("z", "x")],
        );
        let err = compute_critical_path_lengths(&graph).unwrap_err();

        match err {
            AnalysisError::Cycle(cycle) => {
                assert_eq!(cycle.trace(), "x -> y -> z -> x");
                assert_eq!(cycle.path.first(), cycle.path.last());
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_loop_is_cycle() {
        let graph = graph_of(&[("a", 1)], &[("a", "a")]);
        let err = compute_critical_path_lengths(&graph).unwrap_err();
        assert!(matches!(err, AnalysisError::Cycle(ref c) if c.trace() == "a -> a"));
    }

    #[test]
    fn test_compute_preserves_input_order_and_memoizes() {
        let graph = graph_of(&[("a", 1), ("b", 1), ("c", 1)], &[("a", "b"), ("b", "c")]);
        let a = graph.find("a").unwrap();
        let b = graph.find("b").unwrap();
        let c = graph.find("c").unwrap();

        let mut analyzer = CriticalPathAnalyzer::new(&graph);
        let order = analyzer.compute([c, a]).unwrap();
        assert_eq!(order, vec![c, a]);

        // b was reached through a
        assert_eq!(analyzer.length(b), Some(2));
        assert_eq!(analyzer.compute([b]).unwrap(), vec![b]);
    }

    #[test]
    fn test_idempotent() {
        let graph = graph_of(
            &[("a", 4), ("b", 2), ("c", 9), ("d", 1)],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        );
        let first = compute_critical_path_lengths(&graph).unwrap();
        let second = compute_critical_path_lengths(&graph).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut graph = OperationGraph::new();
        let mut prev = graph.add_operation(Operation::unnamed()).unwrap();
        let first = prev;
        for _ in 1..200_000 {
            let next = graph.add_operation(Operation::unnamed()).unwrap();
            graph.add_dependency(next, prev).unwrap();
            prev = next;
        }

        let lengths = compute_critical_path_lengths(&graph).unwrap();
        assert_eq!(lengths.get(first), Some(200_000));
        assert_eq!(lengths.get(prev), Some(1));
    }

    #[test]
    fn test_empty_graph() {
        let graph = OperationGraph::new();
        let lengths = compute_critical_path_lengths(&graph).unwrap();
        assert!(lengths.is_empty());
    }
}
