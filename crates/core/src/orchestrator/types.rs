//! Types for the migration orchestrator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::provision::ProvisionError;
use crate::transfer::CheckpointStatus;

/// Errors from launching a single task.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The worker could not be started at all.
    #[error("failed to start worker for task {task_id}: {reason}")]
    Spawn { task_id: u64, reason: String },

    /// Waiting on the worker failed.
    #[error("failed to wait for worker: {0}")]
    Io(#[from] std::io::Error),

    /// The worker ran but did not succeed.
    #[error("worker for task {task_id} failed: {reason}")]
    WorkerFailed { task_id: u64, reason: String },
}

impl LaunchError {
    /// Whether the failure is confined to the task itself.
    pub fn is_task_failure(&self) -> bool {
        matches!(self, LaunchError::WorkerFailed { .. })
    }
}

/// Errors that stop a migration before any task runs.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("cancellation flag error: {0}")]
    Flag(#[from] std::io::Error),

    #[error("failed to set up clients: {0}")]
    Setup(String),
}

/// Running count of task outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationTally {
    pub total: usize,
    pub finished: usize,
    pub dropped: usize,
    pub failed: usize,
    /// Tasks that stopped because cancellation was requested. Not counted as done.
    pub interrupted: usize,
}

impl MigrationTally {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, status: CheckpointStatus) {
        match status {
            CheckpointStatus::Finished => self.finished += 1,
            CheckpointStatus::Dropped => self.dropped += 1,
            CheckpointStatus::Failed => self.failed += 1,
            CheckpointStatus::Interrupted => self.interrupted += 1,
        }
    }

    /// Tasks with a reported outcome.
    pub fn completed(&self) -> usize {
        self.finished + self.dropped + self.failed + self.interrupted
    }

    /// Whether every task was finished or dropped.
    pub fn is_complete(&self) -> bool {
        self.finished + self.dropped >= self.total
    }
}

/// Called with the tally after every task completion.
pub type ProgressCallback = Arc<dyn Fn(&MigrationTally) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupted_does_not_complete() {
        let mut tally = MigrationTally::new(2);
        tally.record(CheckpointStatus::Finished);
        tally.record(CheckpointStatus::Interrupted);

        assert_eq!(tally.completed(), 2);
        assert_eq!(tally.interrupted, 1);
        assert!(!tally.is_complete());

        tally.interrupted = 0;
        tally.record(CheckpointStatus::Dropped);
        assert!(tally.is_complete());
    }

    #[test]
    fn test_empty_run_is_complete() {
        assert!(MigrationTally::new(0).is_complete());
    }

    #[test]
    fn test_tally_serialization() {
        let json = serde_json::to_value(MigrationTally::new(3)).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["interrupted"], 0);
    }

    #[test]
    fn test_task_failure_classification() {
        let failed = LaunchError::WorkerFailed {
            task_id: 1,
            reason: "exit 1".to_string(),
        };
        let spawn = LaunchError::Spawn {
            task_id: 1,
            reason: "no such file".to_string(),
        };
        assert!(failed.is_task_failure());
        assert!(!spawn.is_task_failure());
    }
}
