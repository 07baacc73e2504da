//! Status-transition telemetry.
//!
//! The scheduler reports every status change of every operation to a
//! [`StatusObserver`]. Observers are called from the coordinator, in order,
//! and must not block.

use crate::models::OperationId;
use crate::scheduler::OperationStatus;

/// One status transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEvent {
    pub id: OperationId,
    pub name: String,
    pub status: OperationStatus,
    pub critical_path_length: u64,
}

/// Receives status transitions for progress reporting.
pub trait StatusObserver: Send + Sync {
    fn on_status_changed(&self, event: &StatusEvent);
}

/// Observer that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl StatusObserver for NullObserver {
    fn on_status_changed(&self, _event: &StatusEvent) {}
}

impl<F> StatusObserver for F
where
    F: Fn(&StatusEvent) + Send + Sync,
{
    fn on_status_changed(&self, event: &StatusEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_observer() {
        let seen = Mutex::new(Vec::new());
        let observer = |event: &StatusEvent| seen.lock().unwrap().push(event.status);

        observer.on_status_changed(&StatusEvent {
            id: OperationId(0),
            name: "a".to_string(),
            status: OperationStatus::Running,
            critical_path_length: 1,
        });

        assert_eq!(*seen.lock().unwrap(), vec![OperationStatus::Running]);
    }
}
