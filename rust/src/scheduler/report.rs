//! Final per-operation report of a scheduler run.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::OperationId;

use super::state::OperationStatus;

/// How a succeeded operation got there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuccessKind {
    Executed,
    /// Output restored from the build cache; the runner was not called.
    FromCache,
    /// Executed, with warnings.
    WithWarnings,
    /// Executed, and there was nothing to do.
    NoOp,
}

/// Why an operation was skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// A dependency failed, was aborted, or was itself skipped.
    Blocked {
        /// The direct dependency that blocked this operation.
        dependency: OperationId,
        /// The failed or aborted operation at the start of the chain.
        root_cause: OperationId,
    },
    /// Not started because `trigger` failed under the fail-fast policy.
    FailFast { trigger: OperationId },
    /// Not started because the run was cancelled.
    Cancelled,
}

/// Outcome of one run as a whole.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// Everything succeeded, but an operation that does not allow warnings
    /// produced some.
    SuccessWithWarnings,
    Failure,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::SuccessWithWarnings => write!(f, "success with warnings"),
            Self::Failure => write!(f, "failure"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final state of one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationRecord {
    pub id: OperationId,
    pub name: String,
    pub status: OperationStatus,
    pub critical_path_length: u64,
    /// Set for succeeded operations.
    pub success_kind: Option<SuccessKind>,
    /// Error detail for failed operations.
    pub error: Option<String>,
    /// Warning text for operations that succeeded with warnings.
    pub warnings: Option<String>,
    /// Set for skipped operations.
    pub skip_reason: Option<SkipReason>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OperationRecord {
    pub(crate) fn new(id: OperationId, name: String, critical_path_length: u64) -> Self {
        Self {
            id,
            name,
            status: OperationStatus::Pending,
            critical_path_length,
            success_kind: None,
            error: None,
            warnings: None,
            skip_reason: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Wall-clock time between dispatch and completion.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

/// Terminal state of every operation after a run.
#[derive(Clone, Debug)]
pub struct ExecutionReport {
    pub status: RunStatus,
    /// Slot count the run used.
    pub concurrency_limit: usize,
    /// One record per operation, in insertion order.
    pub records: Vec<OperationRecord>,
}

impl ExecutionReport {
    pub fn get(&self, id: OperationId) -> Option<&OperationRecord> {
        self.records.get(id.index())
    }

    /// Record by operation name.
    pub fn find(&self, name: &str) -> Option<&OperationRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn status_of(&self, id: OperationId) -> Option<OperationStatus> {
        self.get(id).map(|r| r.status)
    }

    /// Number of operations that ended in `status`.
    pub fn count(&self, status: OperationStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &OperationRecord> {
        self.with_status(OperationStatus::Failed)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &OperationRecord> {
        self.with_status(OperationStatus::Skipped)
    }

    fn with_status(&self, status: OperationStatus) -> impl Iterator<Item = &OperationRecord> {
        self.records.iter().filter(move |r| r.status == status)
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            RunStatus::Success | RunStatus::SuccessWithWarnings
        )
    }

    /// The failed or aborted operation that caused `id` to be skipped.
    pub fn root_cause(&self, id: OperationId) -> Option<OperationId> {
        match self.get(id)?.skip_reason? {
            SkipReason::Blocked { root_cause, .. } => Some(root_cause),
            SkipReason::FailFast { trigger } => Some(trigger),
            SkipReason::Cancelled => None,
        }
    }

    /// Human-readable outcome of one operation.
    pub fn describe(&self, id: OperationId) -> Option<String> {
        let record = self.get(id)?;
        let text = match record.status {
            OperationStatus::Succeeded => match record.success_kind {
                Some(SuccessKind::FromCache) => "succeeded (restored from cache)".to_string(),
                Some(SuccessKind::WithWarnings) => "succeeded with warnings".to_string(),
                Some(SuccessKind::NoOp) => "succeeded (no work to do)".to_string(),
                _ => "succeeded".to_string(),
            },
            OperationStatus::Failed => "failed (see execution log)".to_string(),
            OperationStatus::Aborted => "aborted".to_string(),
            OperationStatus::Skipped => match record.skip_reason {
                Some(SkipReason::Blocked { dependency, .. }) => {
                    let dep = self.get(dependency);
                    let verb = match dep.map(|d| d.status) {
                        Some(OperationStatus::Failed) => "failed",
                        Some(OperationStatus::Aborted) => "was aborted",
                        _ => "was skipped",
                    };
                    let dep_name = dep.map_or_else(|| dependency.to_string(), |d| d.name.clone());
                    format!("skipped (because dependency {dep_name} {verb})")
                }
                Some(SkipReason::FailFast { trigger }) => {
                    let trigger_name = self
                        .get(trigger)
                        .map_or_else(|| trigger.to_string(), |t| t.name.clone());
                    format!("skipped (fail-fast after {trigger_name} failed)")
                }
                Some(SkipReason::Cancelled) | None => "skipped (run cancelled)".to_string(),
            },
            other => format!("{other:?}").to_lowercase(),
        };
        Some(text)
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} ({} operations)", self.status, self.records.len())?;
        for record in &self.records {
            if let Some(text) = self.describe(record.id) {
                writeln!(f, "  {}: {}", record.name, text)?;
            }
        }
        Ok(())
    }
}
