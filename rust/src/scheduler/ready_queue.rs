//! Ready set ordered for dispatch.
//!
//! Greatest critical path length first; equal lengths go in graph insertion
//! order (lower `OperationId` first), so dispatch order is deterministic for
//! a fixed graph.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::models::OperationId;

/// Dispatch key. `Ord` puts the entry to dispatch next at the top of the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ReadyEntry {
    critical_path_length: u64,
    id: OperationId,
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.critical_path_length
            .cmp(&other.critical_path_length)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of operations waiting for a slot.
///
/// Entries are not removed when an operation is skipped; callers check the
/// operation's status after `pop`.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    heap: BinaryHeap<ReadyEntry>,
}

impl ReadyQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, id: OperationId, critical_path_length: u64) {
        self.heap.push(ReadyEntry {
            critical_path_length,
            id,
        });
    }

    /// Remove and return the next operation to dispatch.
    pub fn pop(&mut self) -> Option<OperationId> {
        self.heap.pop().map(|entry| entry.id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_critical_path_first() {
        let mut queue = ReadyQueue::with_capacity(3);
        queue.push(OperationId(0), 2);
        queue.push(OperationId(1), 7);
        queue.push(OperationId(2), 4);

        assert_eq!(queue.pop(), Some(OperationId(1)));
        assert_eq!(queue.pop(), Some(OperationId(2)));
        assert_eq!(queue.pop(), Some(OperationId(0)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_ties_in_insertion_order() {
        let mut queue = ReadyQueue::default();
        queue.push(OperationId(5), 3);
        queue.push(OperationId(1), 3);
        queue.push(OperationId(3), 3);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(OperationId(1)));
        assert_eq!(queue.pop(), Some(OperationId(3)));
        assert_eq!(queue.pop(), Some(OperationId(5)));
        assert!(queue.is_empty());
    }
}
