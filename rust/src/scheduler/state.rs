//! Per-run scheduler state.
//!
//! Owned exclusively by the coordinator; running operations never touch it
//! and report back through the completion channel instead.

use crate::critical_path::CriticalPathLengths;
use crate::models::{OperationGraph, OperationId};

use super::report::{OperationRecord, SkipReason};

/// Lifecycle of one operation within a run.
///
/// `Pending -> Ready -> Running -> {Succeeded, Failed, Aborted}`, or
/// `Pending/Ready -> Skipped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationStatus {
    /// At least one dependency has not succeeded yet.
    Pending,
    /// Every dependency succeeded; waiting for a slot.
    Ready,
    Running,
    Succeeded,
    Failed,
    /// A dependency failed or was skipped, fail-fast stopped the run, or the
    /// run was cancelled before this operation started.
    Skipped,
    /// Was running when the run was cancelled, and stopped.
    Aborted,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::Aborted
        )
    }

    /// Not started yet, and can still be skipped.
    pub fn is_waiting(self) -> bool {
        matches!(self, Self::Pending | Self::Ready)
    }
}

/// Transient state of one run.
pub struct RunState {
    /// Record per operation; `status` lives here.
    pub records: Vec<OperationRecord>,
    /// Dependencies of each operation that have not succeeded yet.
    remaining_deps: Vec<usize>,
    /// Operations currently running.
    pub running: usize,
    /// Set by fail-fast or cancellation; no further dispatches.
    pub stop_dispatch: bool,
}

impl RunState {
    pub fn new(graph: &OperationGraph, lengths: &CriticalPathLengths) -> Self {
        let records = graph
            .ids()
            .map(|id| OperationRecord::new(id, graph.display_name(id), lengths.get(id).unwrap_or(0)))
            .collect();
        let remaining_deps = graph
            .ids()
            .map(|id| graph.dependencies(id).len())
            .collect();

        Self {
            records,
            remaining_deps,
            running: 0,
            stop_dispatch: false,
        }
    }

    #[inline]
    pub fn status(&self, id: OperationId) -> OperationStatus {
        self.records[id.index()].status
    }

    #[inline]
    pub fn record_mut(&mut self, id: OperationId) -> &mut OperationRecord {
        &mut self.records[id.index()]
    }

    /// Count one dependency of `id` as succeeded.
    ///
    /// Returns true if this was the last one and `id` is still pending.
    pub fn satisfy_dependency(&mut self, id: OperationId) -> bool {
        let remaining = &mut self.remaining_deps[id.index()];
        *remaining = remaining.saturating_sub(1);
        *remaining == 0 && self.status(id) == OperationStatus::Pending
    }

    pub fn is_ready_at_start(&self, id: OperationId) -> bool {
        self.remaining_deps[id.index()] == 0
    }

    /// Mark a waiting operation skipped. Returns false if it was not waiting.
    pub fn skip(&mut self, id: OperationId, reason: SkipReason) -> bool {
        let record = self.record_mut(id);
        if !record.status.is_waiting() {
            return false;
        }
        record.status = OperationStatus::Skipped;
        record.skip_reason = Some(reason);
        true
    }

    /// Operations that have not started, in insertion order.
    pub fn waiting(&self) -> Vec<OperationId> {
        self.records
            .iter()
            .filter(|r| r.status.is_waiting())
            .map(|r| r.id)
            .collect()
    }

    /// First operation that has not reached a terminal state.
    pub fn first_unfinished(&self) -> Option<OperationId> {
        self.records
            .iter()
            .find(|r| !r.status.is_terminal())
            .map(|r| r.id)
    }

    pub fn any(&self, status: OperationStatus) -> bool {
        self.records.iter().any(|r| r.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critical_path::compute_critical_path_lengths;
    use crate::models::Operation;

    fn chain() -> (OperationGraph, OperationId, OperationId) {
        let mut graph = OperationGraph::new();
        let a = graph.add_operation(Operation::named("a")).unwrap();
        let b = graph.add_operation(Operation::named("b")).unwrap();
        graph.add_dependency(b, a).unwrap();
        (graph, a, b)
    }

    #[test]
    fn test_initial_state() {
        let (graph, a, b) = chain();
        let lengths = compute_critical_path_lengths(&graph).unwrap();
        let state = RunState::new(&graph, &lengths);

        assert_eq!(state.status(a), OperationStatus::Pending);
        assert!(state.is_ready_at_start(a));
        assert!(!state.is_ready_at_start(b));
        assert_eq!(state.records[a.index()].critical_path_length, 2);
        assert_eq!(state.first_unfinished(), Some(a));
    }

    #[test]
    fn test_satisfy_dependency_and_skip() {
        let (graph, a, b) = chain();
        let lengths = compute_critical_path_lengths(&graph).unwrap();
        let mut state = RunState::new(&graph, &lengths);

        assert!(state.satisfy_dependency(b));

        assert!(state.skip(b, SkipReason::Cancelled));
        assert_eq!(state.status(b), OperationStatus::Skipped);
        // already terminal
        assert!(!state.skip(b, SkipReason::Cancelled));
        assert_eq!(state.waiting(), vec![a]);
    }

    #[test]
    fn test_status_predicates() {
        assert!(OperationStatus::Aborted.is_terminal());
        assert!(!OperationStatus::Running.is_terminal());
        assert!(OperationStatus::Ready.is_waiting());
        assert!(!OperationStatus::Running.is_waiting());
    }
}
