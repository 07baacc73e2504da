//! Collaborator interfaces: the runner that does an operation's work and the
//! build cache that may let it be skipped.
//!
//! Both are async traits so implementations can spawn processes or talk to a
//! remote cache without blocking the coordinator. Implementations must be
//! thread-safe; each running operation gets its own spawned task.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::OperationId;

/// Everything a collaborator needs to know about the operation it handles.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    pub id: OperationId,
    /// Display name (the ID for unnamed operations).
    pub name: String,
    pub weight: u64,
    pub critical_path_length: u64,
    /// Fires when the run is cancelled; runners should stop promptly and
    /// resolve to [`ExecutionOutcome::Cancelled`].
    pub cancellation: CancellationToken,
}

/// How one execution attempt ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    /// Succeeded, but produced warnings worth surfacing.
    SucceededWithWarnings(String),
    /// The operation had no work to do.
    NoOp,
    /// Failed with an error detail for the report.
    Failed(String),
    /// Stopped because the run was cancelled.
    Cancelled,
}

/// Runs the actual work of an operation.
#[async_trait]
pub trait OperationRunner: Send + Sync {
    async fn execute(&self, ctx: &ExecutionContext) -> ExecutionOutcome;
}

/// A failure inside the cache layer. Always treated as a cache miss.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("build cache error: {0}")]
pub struct CacheError(pub String);

/// Decides whether an operation's previous output can be reused.
#[async_trait]
pub trait BuildCache: Send + Sync {
    /// `Ok(true)` restores the operation's output; it will not be executed.
    async fn try_restore(&self, ctx: &ExecutionContext) -> Result<bool, CacheError>;
}

/// A cache that never hits.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

#[async_trait]
impl BuildCache for NoCache {
    async fn try_restore(&self, _ctx: &ExecutionContext) -> Result<bool, CacheError> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ExecutionContext {
        ExecutionContext {
            id: OperationId(0),
            name: "a".to_string(),
            weight: 1,
            critical_path_length: 1,
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn test_no_cache_never_hits() {
        assert_eq!(NoCache.try_restore(&ctx()).await, Ok(false));
    }

    #[test]
    fn test_cache_error_message() {
        let err = CacheError("connection refused".to_string());
        assert_eq!(err.to_string(), "build cache error: connection refused");
    }
}
