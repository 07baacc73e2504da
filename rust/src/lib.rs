//! Operation graph scheduling.
//!
//! Builds a dependency graph of operations, computes the critical path length
//! of every operation (failing fast with a minimal cycle trace when the graph
//! is not a DAG), and executes the graph with bounded concurrency, longest
//! critical path first.
//!
//! ```ignore
//! let mut graph = OperationGraph::new();
//! let compile = graph.add_operation(Operation::named("compile").with_weight(30))?;
//! let test = graph.add_operation(Operation::named("test"))?;
//! graph.add_dependency(test, compile)?;
//!
//! let report = Scheduler::new(SchedulerConfig::default())
//!     .run(&graph, runner, Arc::new(NoCache), CancellationToken::new())
//!     .await?;
//! ```

pub mod config;
pub mod critical_path;
pub mod events;
pub mod executor;
mod interner;
pub mod logging;
pub mod models;
pub mod scheduler;

pub use config::{ConfigError, FailurePolicy, Parallelism, SchedulerConfig};
pub use critical_path::{
    compute_critical_path_lengths, shortest_path, AnalysisError, CriticalPathAnalyzer,
    CriticalPathLengths, CycleError, NoPathError,
};
pub use events::{NullObserver, StatusEvent, StatusObserver};
pub use executor::{
    BuildCache, CacheError, ExecutionContext, ExecutionOutcome, NoCache, OperationRunner,
};
pub use models::{GraphError, Operation, OperationGraph, OperationId};
pub use scheduler::{
    ExecutionReport, OperationRecord, OperationStatus, RunStatus, Scheduler, SchedulerError,
    SkipReason, SuccessKind,
};
pub use tokio_util::sync::CancellationToken;
