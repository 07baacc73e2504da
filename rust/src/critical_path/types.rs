//! Types for critical path analysis.

use thiserror::Error;

use crate::models::{OperationGraph, OperationId};

/// Computed critical path length per operation, indexed by `OperationId`.
///
/// Owned by one analysis pass; a rebuilt graph gets a fresh table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CriticalPathLengths {
    lengths: Vec<u64>,
}

impl CriticalPathLengths {
    pub(crate) fn new(lengths: Vec<u64>) -> Self {
        Self { lengths }
    }

    /// Critical path length of `id`, if it belongs to the analyzed graph.
    #[inline]
    pub fn get(&self, id: OperationId) -> Option<u64> {
        self.lengths.get(id.index()).copied()
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// `(id, length)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (OperationId, u64)> + '_ {
        self.lengths
            .iter()
            .enumerate()
            .map(|(i, &len)| (OperationId(i as u32), len))
    }

    /// The longest critical path length in the graph (0 when empty).
    pub fn max(&self) -> u64 {
        self.lengths.iter().copied().max().unwrap_or(0)
    }

    /// Reconstruct one longest chain of consumers.
    ///
    /// Starts at the operation with the greatest length and repeatedly steps
    /// to the consumer with the greatest length. Ties go to the lowest ID.
    pub fn critical_chain(&self, graph: &OperationGraph) -> Vec<OperationId> {
        let mut chain = Vec::new();
        let mut current = self.iter().fold(None, |best: Option<(OperationId, u64)>, (id, len)| {
            match best {
                Some((_, best_len)) if best_len >= len => best,
                _ => Some((id, len)),
            }
        });

        while let Some((id, _)) = current {
            chain.push(id);
            current = graph
                .consumers(id)
                .iter()
                .filter_map(|&c| self.get(c).map(|len| (c, len)))
                .fold(None, |best: Option<(OperationId, u64)>, (c, len)| match best {
                    Some((best_id, best_len))
                        if best_len > len || (best_len == len && best_id < c) =>
                    {
                        best
                    }
                    _ => Some((c, len)),
                });
        }

        chain
    }
}

/// A dependency cycle, as the minimal chain of consumer edges from the
/// re-entered operation back to itself.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("A cyclic dependency was encountered: {}", .names.join(" -> "))]
pub struct CycleError {
    /// Operation IDs in chain order; first and last are the same operation.
    pub path: Vec<OperationId>,
    /// Display names matching `path`.
    pub names: Vec<String>,
}

impl CycleError {
    pub fn new(graph: &OperationGraph, path: Vec<OperationId>) -> Self {
        let names = path.iter().map(|&id| graph.display_name(id)).collect();
        Self { path, names }
    }

    /// Render the cycle as `a -> b -> a`.
    pub fn trace(&self) -> String {
        self.names.join(" -> ")
    }
}

/// No chain of consumer edges connects the two operations.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("No path from {start} to {end} over consumer edges")]
pub struct NoPathError {
    pub start: OperationId,
    pub end: OperationId,
}

/// Errors that abort a critical path analysis.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(transparent)]
    Cycle(#[from] CycleError),
    /// The cycle detector found a cycle the diagnostics could not trace.
    #[error("Internal error while diagnosing a cycle: {0}")]
    Internal(#[from] NoPathError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operation;

    #[test]
    fn test_lengths_accessors() {
        let lengths = CriticalPathLengths::new(vec![3, 2, 1]);
        assert_eq!(lengths.get(OperationId(0)), Some(3));
        assert_eq!(lengths.get(OperationId(3)), None);
        assert_eq!(lengths.max(), 3);
        assert_eq!(lengths.len(), 3);
        assert_eq!(CriticalPathLengths::default().max(), 0);
    }

    #[test]
    fn test_cycle_error_rendering() {
        let mut graph = OperationGraph::new();
        let a = graph.add_operation(Operation::named("a")).unwrap();
        let b = graph.add_operation(Operation::named("b")).unwrap();

        let err = CycleError::new(&graph, vec![a, b, a]);
        assert_eq!(err.trace(), "a -> b -> a");
        assert_eq!(
            err.to_string(),
            "A cyclic dependency was encountered: a -> b -> a"
        );

        let analysis = AnalysisError::from(err.clone());
        assert_eq!(analysis.to_string(), err.to_string());
    }

    #[test]
    fn test_no_path_error_is_reusable() {
        let err = NoPathError {
            start: OperationId(1),
            end: OperationId(0),
        };
        let analysis: AnalysisError = err.into();
        assert_eq!(analysis, AnalysisError::Internal(err));
        assert_eq!(
            analysis.to_string(),
            "Internal error while diagnosing a cycle: No path from #1 to #0 over consumer edges"
        );
    }
}
