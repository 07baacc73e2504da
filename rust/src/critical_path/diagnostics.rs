//! Cycle diagnostics: shortest consumer chain between two operations.
//!
//! Breadth-first search starting at `end` and walking dependency edges (the
//! reverse of consumer edges). Every operation records the operation that
//! discovered it, so once `start` is found the parent links read as consumer
//! edges from `start` to `end`. BFS visits in non-decreasing edge distance,
//! which makes the chain minimal.

use std::collections::VecDeque;

use crate::models::{OperationGraph, OperationId};

use super::types::{CycleError, NoPathError};

/// Shortest chain of consumer edges from `start` to `end`, inclusive.
///
/// With `start == end` this is the shortest non-empty cycle through `start`.
/// Returns [`NoPathError`] if `end` is not reachable from `start`.
pub fn shortest_path(
    graph: &OperationGraph,
    start: OperationId,
    end: OperationId,
) -> Result<Vec<OperationId>, NoPathError> {
    let not_found = NoPathError { start, end };
    if !graph.contains(start) || !graph.contains(end) {
        return Err(not_found);
    }

    let mut parent: Vec<Option<OperationId>> = vec![None; graph.len()];
    let mut discovered = vec![false; graph.len()];
    let mut queue = VecDeque::new();

    discovered[end.index()] = true;
    queue.push_back(end);

    // The operation that discovered `start`. Kept apart from `parent` so that
    // `start == end` still finds a cycle instead of the empty path.
    let mut found_from: Option<OperationId> = None;

    'search: while let Some(current) = queue.pop_front() {
        for &dep in graph.dependencies(current) {
            if dep == start {
                found_from = Some(current);
                break 'search;
            }
            if !discovered[dep.index()] {
                discovered[dep.index()] = true;
                parent[dep.index()] = Some(current);
                queue.push_back(dep);
            }
        }
    }

    let mut node = found_from.ok_or(not_found)?;
    let mut path = vec![start];
    loop {
        path.push(node);
        if node == end {
            break;
        }
        node = parent[node.index()].ok_or(not_found)?;
    }
    Ok(path)
}

/// Build the cycle error for an operation re-entered during traversal.
pub(crate) fn diagnose_cycle(
    graph: &OperationGraph,
    reentered: OperationId,
) -> Result<CycleError, NoPathError> {
    let path = shortest_path(graph, reentered, reentered)?;
    Ok(CycleError::new(graph, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operation;

    /// Build a graph from `(dependency, consumer)` edges over named nodes.
    fn graph_of(names: &[&str], edges: &[(&str, &str)]) -> OperationGraph {
        let mut graph = OperationGraph::new();
        for name in names {
            graph.add_operation(Operation::named(*name)).unwrap();
        }
        for (dep, consumer) in edges {
            let dep = graph.find(dep).unwrap();
            let consumer = graph.find(consumer).unwrap();
            graph.add_dependency(consumer, dep).unwrap();
        }
        graph
    }

    fn names(graph: &OperationGraph, path: &[OperationId]) -> Vec<String> {
        path.iter().map(|&id| graph.display_name(id)).collect()
    }

    #[test]
    fn test_path_follows_consumer_edges() {
        let graph = graph_of(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        let a = graph.find("a").unwrap();
        let c = graph.find("c").unwrap();

        let path = shortest_path(&graph, a, c).unwrap();
        assert_eq!(names(&graph, &path), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_shortest_of_two_routes() {
        // a -> b -> c -> d and a shortcut a -> d
        let graph = graph_of(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("b", "c"), ("c", "d"), ("a", "d")],
        );
        let a = graph.find("a").unwrap();
        let d = graph.find("d").unwrap();

        let path = shortest_path(&graph, a, d).unwrap();
        assert_eq!(names(&graph, &path), vec!["a", "d"]);
    }

    #[test]
    fn test_no_path() {
        let graph = graph_of(&["a", "b"], &[("a", "b")]);
        let a = graph.find("a").unwrap();
        let b = graph.find("b").unwrap();

        let err = shortest_path(&graph, b, a).unwrap_err();
        assert_eq!(err, NoPathError { start: b, end: a });
    }

    #[test]
    fn test_minimal_cycle() {
        // Long cycle a -> b -> c -> d -> a plus a short one a -> e -> a
        let graph = graph_of(
            &["a", "b", "c", "d", "e"],
            &[
                ("a", "b"),
                ("b", "c"),
                ("c", "d"),
                ("d", "a"),
                ("a", "e"),
                ("e", "a"),
            ],
        );
        let a = graph.find("a").unwrap();

        let cycle = diagnose_cycle(&graph, a).unwrap();
        assert_eq!(cycle.trace(), "a -> e -> a");
    }

    #[test]
    fn test_three_cycle_in_consumer_order() {
        let graph = graph_of(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        let a = graph.find("a").unwrap();

        let cycle = diagnose_cycle(&graph, a).unwrap();
        assert_eq!(cycle.trace(), "a -> b -> c -> a");
    }

    #[test]
    fn test_self_loop() {
        let graph = graph_of(&["a"], &[("a", "a")]);
        let a = graph.find("a").unwrap();

        let path = shortest_path(&graph, a, a).unwrap();
        assert_eq!(path, vec![a, a]);
    }
}
