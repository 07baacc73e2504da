//! Core data types for the operation graph.
//!
//! The graph is built once per invocation by the caller and is read-only for
//! the analyzer and the scheduler. Edges are stored in both directions:
//! - `consumers`: operations that depend on this one (run later)
//! - `dependencies`: operations this one depends on (run earlier)

use std::fmt;

use thiserror::Error;

use crate::interner::NameIndex;

/// Dense operation identifier, assigned in insertion order.
///
/// Insertion order doubles as the scheduler's tie-break order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub u32);

impl OperationId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors raised while building a graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Operation {0} is not part of this graph")]
    UnknownOperation(OperationId),
    #[error("Duplicate operation name {name:?} (already used by {existing})")]
    DuplicateName { name: String, existing: OperationId },
}

/// One schedulable unit of work.
#[derive(Clone, Debug, Default)]
pub struct Operation {
    name: Option<String>,
    weight: u64,
    allow_warnings: bool,
    consumers: Vec<OperationId>,
    dependencies: Vec<OperationId>,
}

impl Operation {
    /// An operation with a diagnostic name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// A synthetic operation with no name.
    pub fn unnamed() -> Self {
        Self::default()
    }

    /// Set the cost estimate (e.g. historical duration). Zero means unset.
    pub fn with_weight(mut self, weight: u64) -> Self {
        self.weight = weight;
        self
    }

    /// Whether warnings from this operation still count as a clean success.
    pub fn with_warnings_allowed(mut self, allow: bool) -> Self {
        self.allow_warnings = allow;
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Raw weight as supplied; zero if unset.
    pub fn weight(&self) -> u64 {
        self.weight
    }

    /// Weight used in path sums: an unset or zero weight counts as 1.
    #[inline]
    pub fn effective_weight(&self) -> u64 {
        self.weight.max(1)
    }

    pub fn warnings_allowed(&self) -> bool {
        self.allow_warnings
    }

    /// Operations that depend on this one.
    pub fn consumers(&self) -> &[OperationId] {
        &self.consumers
    }

    /// Operations this one depends on.
    pub fn dependencies(&self) -> &[OperationId] {
        &self.dependencies
    }
}

/// Operation graph: an arena of operations plus a name index.
#[derive(Clone, Debug, Default)]
pub struct OperationGraph {
    operations: Vec<Operation>,
    names: NameIndex,
}

impl OperationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            operations: Vec::with_capacity(capacity),
            names: NameIndex::with_capacity(capacity),
        }
    }

    /// Add an operation and return its ID.
    ///
    /// Edges set on `operation` before insertion are discarded; use
    /// [`add_dependency`](Self::add_dependency) to wire the graph.
    pub fn add_operation(&mut self, mut operation: Operation) -> Result<OperationId, GraphError> {
        let id = OperationId(self.operations.len() as u32);
        if let Some(name) = operation.name.as_deref() {
            self.names
                .insert(name, id)
                .map_err(|existing| GraphError::DuplicateName {
                    name: name.to_string(),
                    existing,
                })?;
        }
        operation.consumers.clear();
        operation.dependencies.clear();
        self.operations.push(operation);
        Ok(id)
    }

    /// Declare that `consumer` depends on `dependency`.
    ///
    /// Repeated edges are ignored. A self-edge is accepted here and reported
    /// as a cycle by the critical path analyzer.
    pub fn add_dependency(
        &mut self,
        consumer: OperationId,
        dependency: OperationId,
    ) -> Result<(), GraphError> {
        self.check(consumer)?;
        self.check(dependency)?;

        let dep = &mut self.operations[dependency.index()];
        if dep.consumers.contains(&consumer) {
            return Ok(());
        }
        dep.consumers.push(consumer);
        self.operations[consumer.index()]
            .dependencies
            .push(dependency);
        Ok(())
    }

    fn check(&self, id: OperationId) -> Result<(), GraphError> {
        if id.index() < self.operations.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownOperation(id))
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn contains(&self, id: OperationId) -> bool {
        id.index() < self.operations.len()
    }

    pub fn get(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(id.index())
    }

    /// Look up an operation by name.
    pub fn find(&self, name: &str) -> Option<OperationId> {
        self.names.get(name)
    }

    /// Operation name, or its ID for synthetic operations.
    pub fn display_name(&self, id: OperationId) -> String {
        match self.get(id).and_then(Operation::name) {
            Some(name) => name.to_string(),
            None => id.to_string(),
        }
    }

    /// All IDs in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = OperationId> + '_ {
        (0..self.operations.len() as u32).map(OperationId)
    }

    /// Operations with no dependencies, in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = OperationId> + '_ {
        self.ids()
            .filter(|id| self.operations[id.index()].dependencies.is_empty())
    }

    /// Consumers of `id`; empty for unknown IDs.
    #[inline]
    pub fn consumers(&self, id: OperationId) -> &[OperationId] {
        self.get(id).map(Operation::consumers).unwrap_or(&[])
    }

    /// Dependencies of `id`; empty for unknown IDs.
    #[inline]
    pub fn dependencies(&self, id: OperationId) -> &[OperationId] {
        self.get(id).map(Operation::dependencies).unwrap_or(&[])
    }
}
