//! Bounded-concurrency scheduler.
//!
//! One coordinator loop owns the run state. Each dispatched operation runs in
//! its own tokio task (cache lookup, then the runner) and reports back exactly
//! one [`Completion`] through a bounded channel.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::{FailurePolicy, SchedulerConfig};
use crate::critical_path::{compute_critical_path_lengths, AnalysisError, CriticalPathLengths};
use crate::events::{NullObserver, StatusEvent, StatusObserver};
use crate::executor::{BuildCache, ExecutionContext, ExecutionOutcome, OperationRunner};
use crate::models::{OperationGraph, OperationId};
use crate::{log_changes, log_checks, log_debug};

use super::ready_queue::ReadyQueue;
use super::report::{ExecutionReport, RunStatus, SkipReason, SuccessKind};
use super::state::{OperationStatus, RunState};

/// Errors that abort a run as a whole.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The graph is not a DAG; nothing was started.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("Scheduler stalled with {remaining} unfinished operations (first: {name})")]
    Stalled { name: String, remaining: usize },
}

/// What a dispatched task sends back.
#[derive(Debug)]
struct Completion {
    id: OperationId,
    result: TaskResult,
    finished_at: DateTime<Utc>,
}

#[derive(Debug)]
enum TaskResult {
    Restored,
    Executed(ExecutionOutcome),
    Panicked(String),
}

/// Runs an operation graph with at most `concurrency_limit` operations in
/// flight, highest critical path length first.
pub struct Scheduler {
    config: SchedulerConfig,
    observer: Arc<dyn StatusObserver>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            observer: Arc::new(NullObserver),
        }
    }

    /// Report every status transition to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Execute every operation of `graph`.
    ///
    /// Fails before starting anything if the graph has a cycle. Otherwise the
    /// run always drains to a terminal state for every operation, including
    /// after `cancellation` fires, and the report carries each one.
    pub async fn run(
        &self,
        graph: &OperationGraph,
        runner: Arc<dyn OperationRunner>,
        cache: Arc<dyn BuildCache>,
        cancellation: CancellationToken,
    ) -> Result<ExecutionReport, SchedulerError> {
        let verbosity = self.config.verbosity;
        let lengths = compute_critical_path_lengths(graph)?;
        let limit = self.config.concurrency_limit(graph.len());

        log_changes!(
            verbosity,
            operations = graph.len(),
            concurrency_limit = limit,
            failure_policy = %self.config.failure_policy,
            "Starting run"
        );

        let mut state = RunState::new(graph, &lengths);
        let mut ready = ReadyQueue::with_capacity(graph.len());
        let (tx, mut rx) = mpsc::channel::<Completion>(limit);

        for id in graph.ids() {
            if state.is_ready_at_start(id) {
                self.make_ready(&mut state, &mut ready, &lengths, id);
            }
        }

        let mut cancelled = false;
        loop {
            if !cancelled && cancellation.is_cancelled() {
                cancelled = true;
                self.cancel_waiting(&mut state);
            }

            while state.running < limit && !state.stop_dispatch {
                let Some(id) = ready.pop() else { break };
                // Skipped after being queued.
                if state.status(id) != OperationStatus::Ready {
                    continue;
                }
                self.dispatch(graph, &mut state, &lengths, id, &runner, &cache, &cancellation, &tx);
            }

            if state.running == 0 {
                break;
            }

            tokio::select! {
                biased;
                _ = cancellation.cancelled(), if !cancelled => {}
                completion = rx.recv() => match completion {
                    Some(completion) => {
                        self.handle_completion(graph, &mut state, &mut ready, &lengths, completion);
                    }
                    None => break,
                },
            }
        }

        if let Some(id) = state.first_unfinished() {
            let remaining = state
                .records
                .iter()
                .filter(|r| !r.status.is_terminal())
                .count();
            return Err(SchedulerError::Stalled {
                name: graph.display_name(id),
                remaining,
            });
        }

        let status = run_status(graph, &state, cancelled);
        log_changes!(verbosity, status = %status, "Run finished");

        Ok(ExecutionReport {
            status,
            concurrency_limit: limit,
            records: state.records,
        })
    }

    fn make_ready(
        &self,
        state: &mut RunState,
        ready: &mut ReadyQueue,
        lengths: &CriticalPathLengths,
        id: OperationId,
    ) {
        state.record_mut(id).status = OperationStatus::Ready;
        ready.push(id, lengths.get(id).unwrap_or(0));
        log_checks!(self.config.verbosity, operation = %state.records[id.index()].name, "Ready");
        self.emit(state, id);
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        graph: &OperationGraph,
        state: &mut RunState,
        lengths: &CriticalPathLengths,
        id: OperationId,
        runner: &Arc<dyn OperationRunner>,
        cache: &Arc<dyn BuildCache>,
        cancellation: &CancellationToken,
        tx: &mpsc::Sender<Completion>,
    ) {
        let record = state.record_mut(id);
        record.status = OperationStatus::Running;
        record.started_at = Some(Utc::now());
        state.running += 1;

        let ctx = ExecutionContext {
            id,
            name: graph.display_name(id),
            weight: graph.get(id).map_or(0, |op| op.weight()),
            critical_path_length: lengths.get(id).unwrap_or(0),
            cancellation: cancellation.child_token(),
        };
        log_checks!(
            self.config.verbosity,
            operation = %ctx.name,
            critical_path_length = ctx.critical_path_length,
            running = state.running,
            "Dispatching"
        );
        self.emit(state, id);

        let runner = Arc::clone(runner);
        let cache = Arc::clone(cache);
        let tx = tx.clone();
        tokio::spawn(async move {
            let work = async {
                let restored = match cache.try_restore(&ctx).await {
                    Ok(hit) => hit,
                    Err(err) => {
                        warn!(operation = %ctx.name, error = %err, "Cache lookup failed, executing");
                        false
                    }
                };
                if restored {
                    TaskResult::Restored
                } else {
                    TaskResult::Executed(runner.execute(&ctx).await)
                }
            };
            let result = AssertUnwindSafe(work)
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| TaskResult::Panicked(panic_message(payload.as_ref())));

            // The coordinator holds the receiver until every task has reported.
            let _ = tx
                .send(Completion {
                    id,
                    result,
                    finished_at: Utc::now(),
                })
                .await;
        });
    }

    fn handle_completion(
        &self,
        graph: &OperationGraph,
        state: &mut RunState,
        ready: &mut ReadyQueue,
        lengths: &CriticalPathLengths,
        completion: Completion,
    ) {
        let Completion {
            id,
            result,
            finished_at,
        } = completion;
        log_debug!(self.config.verbosity, operation = ?id, result = ?result, "Completion received");

        state.running = state.running.saturating_sub(1);
        let record = state.record_mut(id);
        record.finished_at = Some(finished_at);

        match result {
            TaskResult::Restored => {
                record.status = OperationStatus::Succeeded;
                record.success_kind = Some(SuccessKind::FromCache);
            }
            TaskResult::Executed(ExecutionOutcome::Succeeded) => {
                record.status = OperationStatus::Succeeded;
                record.success_kind = Some(SuccessKind::Executed);
            }
            TaskResult::Executed(ExecutionOutcome::SucceededWithWarnings(warnings)) => {
                record.status = OperationStatus::Succeeded;
                record.success_kind = Some(SuccessKind::WithWarnings);
                record.warnings = Some(warnings);
            }
            TaskResult::Executed(ExecutionOutcome::NoOp) => {
                record.status = OperationStatus::Succeeded;
                record.success_kind = Some(SuccessKind::NoOp);
            }
            TaskResult::Executed(ExecutionOutcome::Failed(detail)) => {
                record.status = OperationStatus::Failed;
                record.error = Some(detail);
            }
            TaskResult::Executed(ExecutionOutcome::Cancelled) => {
                record.status = OperationStatus::Aborted;
            }
            TaskResult::Panicked(message) => {
                record.status = OperationStatus::Failed;
                record.error = Some(format!("runner panicked: {message}"));
            }
        }

        let status = record.status;
        log_changes!(self.config.verbosity, operation = %record.name, status = ?status, "Finished");
        self.emit(state, id);

        match status {
            OperationStatus::Succeeded => {
                for &consumer in graph.consumers(id) {
                    if state.satisfy_dependency(consumer) {
                        self.make_ready(state, ready, lengths, consumer);
                    }
                }
            }
            OperationStatus::Failed | OperationStatus::Aborted => {
                self.block_consumers(graph, state, id);
                if status == OperationStatus::Failed
                    && self.config.failure_policy == FailurePolicy::FailFast
                {
                    self.stop_after_failure(state, id);
                }
            }
            _ => {}
        }
    }

    /// Skip every not-yet-started transitive consumer of `root_cause`.
    fn block_consumers(&self, graph: &OperationGraph, state: &mut RunState, root_cause: OperationId) {
        let mut queue: Vec<(OperationId, OperationId)> = graph
            .consumers(root_cause)
            .iter()
            .map(|&consumer| (consumer, root_cause))
            .collect();
        let mut next = 0;

        while next < queue.len() {
            let (id, dependency) = queue[next];
            next += 1;
            let reason = SkipReason::Blocked {
                dependency,
                root_cause,
            };
            if state.skip(id, reason) {
                log_changes!(
                    self.config.verbosity,
                    operation = %state.records[id.index()].name,
                    dependency = %state.records[dependency.index()].name,
                    "Skipped, dependency did not succeed"
                );
                self.emit(state, id);
                queue.extend(graph.consumers(id).iter().map(|&consumer| (consumer, id)));
            }
        }
    }

    /// Fail-fast: nothing else starts; running operations drain.
    fn stop_after_failure(&self, state: &mut RunState, trigger: OperationId) {
        state.stop_dispatch = true;
        for id in state.waiting() {
            if state.skip(id, SkipReason::FailFast { trigger }) {
                self.emit(state, id);
            }
        }
        log_changes!(
            self.config.verbosity,
            trigger = %state.records[trigger.index()].name,
            running = state.running,
            "Fail-fast: no new operations will start"
        );
    }

    fn cancel_waiting(&self, state: &mut RunState) {
        state.stop_dispatch = true;
        for id in state.waiting() {
            if state.skip(id, SkipReason::Cancelled) {
                self.emit(state, id);
            }
        }
        log_changes!(
            self.config.verbosity,
            running = state.running,
            "Run cancelled, waiting for running operations"
        );
    }

    fn emit(&self, state: &RunState, id: OperationId) {
        let record = &state.records[id.index()];
        self.observer.on_status_changed(&StatusEvent {
            id,
            name: record.name.clone(),
            status: record.status,
            critical_path_length: record.critical_path_length,
        });
    }
}

fn run_status(graph: &OperationGraph, state: &RunState, cancelled: bool) -> RunStatus {
    if cancelled {
        return RunStatus::Cancelled;
    }
    if state.any(OperationStatus::Failed) || state.any(OperationStatus::Aborted) {
        return RunStatus::Failure;
    }
    let unexpected_warnings = state.records.iter().any(|r| {
        r.warnings.is_some() && !graph.get(r.id).is_some_and(|op| op.warnings_allowed())
    });
    if unexpected_warnings {
        RunStatus::SuccessWithWarnings
    } else {
        RunStatus::Success
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
