//! Priority-based, concurrency-bounded execution of an operation graph.
//!
//! The scheduler annotates the graph with critical path lengths, then keeps
//! up to the configured number of operations running, always starting the
//! ready operation that gates the longest remaining chain of work.

mod core;
mod ready_queue;
mod report;
mod state;

pub use core::{Scheduler, SchedulerError};
pub use ready_queue::ReadyQueue;
pub use report::{ExecutionReport, OperationRecord, RunStatus, SkipReason, SuccessKind};
pub use state::OperationStatus;
