//! Task execution in worker processes.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::LaunchError;
use crate::config::{Credentials, ACCESS_KEY_ENV, ACCESS_KEY_ID_ENV};
use crate::ledger::TaskRecord;
use crate::transfer::{CheckpointStatus, WorkerReport};

/// Runs one task to completion and reports its status.
#[async_trait]
pub trait TaskLauncher: Send + Sync {
    async fn launch(&self, task: &TaskRecord) -> Result<CheckpointStatus, LaunchError>;
}

/// Runs each task in its own OS process.
///
/// The child is invoked as `<program> worker --cache-path <dir> --task <json>`,
/// receives the credentials through its environment and prints a [`WorkerReport`]
/// as its last stdout line. Children are left running if the orchestrator stops
/// waiting for them.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    cache_path: PathBuf,
    credentials: Credentials,
    extra_args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(
        program: impl Into<PathBuf>,
        cache_path: impl Into<PathBuf>,
        credentials: Credentials,
    ) -> Self {
        Self {
            program: program.into(),
            cache_path: cache_path.into(),
            credentials,
            extra_args: Vec::new(),
        }
    }

    /// Arguments placed before the `worker` subcommand (e.g. global logging flags).
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }
}

#[async_trait]
impl TaskLauncher for ProcessLauncher {
    async fn launch(&self, task: &TaskRecord) -> Result<CheckpointStatus, LaunchError> {
        let task_json = serde_json::to_string(task).map_err(|e| LaunchError::Spawn {
            task_id: task.id,
            reason: e.to_string(),
        })?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.extra_args)
            .arg("worker")
            .arg("--cache-path")
            .arg(&self.cache_path)
            .arg("--task")
            .arg(&task_json)
            .env(ACCESS_KEY_ID_ENV, &self.credentials.access_key_id)
            .env(ACCESS_KEY_ENV, &self.credentials.access_key)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(false);
        // Own group: a terminal interrupt reaches the orchestrator only, workers
        // stop through the flag.
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|e| LaunchError::Spawn {
            task_id: task.id,
            reason: e.to_string(),
        })?;
        debug!(task_id = task.id, pid = ?child.id(), "Started worker");

        let output = child.wait_with_output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = last_report(&stdout);

        if !output.status.success() {
            return Err(LaunchError::WorkerFailed {
                task_id: task.id,
                reason: format!("worker exited with {}", output.status),
            });
        }

        match report {
            Some(report) if report.task_id == task.id => Ok(report.status),
            Some(report) => {
                warn!(task_id = task.id, reported = report.task_id, "Worker reported another task");
                Err(LaunchError::WorkerFailed {
                    task_id: task.id,
                    reason: format!("report is for task {}", report.task_id),
                })
            }
            None => Err(LaunchError::WorkerFailed {
                task_id: task.id,
                reason: "worker printed no report".to_string(),
            }),
        }
    }
}

fn last_report(stdout: &str) -> Option<WorkerReport> {
    let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
    serde_json::from_str(line.trim()).ok()
}
