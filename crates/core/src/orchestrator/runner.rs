//! Bounded worker pool.
//!
//! At most `min(pool_size, tasks)` tasks are in flight. Results are handled in
//! completion order. A shutdown request or an orchestration error raises the
//! cancellation flag, drops the queued tasks and waits a bounded grace period
//! for the running ones.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::config::RunnerConfig;
use super::launcher::TaskLauncher;
use super::types::{LaunchError, MigrationTally, OrchestratorError, ProgressCallback};
use crate::cancel::CancelFlag;
use crate::ledger::TaskRecord;
use crate::transfer::CheckpointStatus;

type TaskResult = (TaskRecord, Result<CheckpointStatus, LaunchError>);

/// Runs task records through a [`TaskLauncher`] with bounded parallelism.
pub struct MigrationRunner {
    config: RunnerConfig,
    launcher: Arc<dyn TaskLauncher>,
    flag: CancelFlag,
    on_progress: Option<ProgressCallback>,
}

impl MigrationRunner {
    pub fn new(config: RunnerConfig, launcher: Arc<dyn TaskLauncher>, flag: CancelFlag) -> Self {
        Self {
            config,
            launcher,
            flag,
            on_progress: None,
        }
    }

    /// Set a callback invoked with the tally after every completed task.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Run every task, stopping early when `shutdown` resolves.
    pub async fn run<F>(&self, tasks: Vec<TaskRecord>, shutdown: F) -> Result<MigrationTally, OrchestratorError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut tally = MigrationTally::new(tasks.len());
        self.flag.clear()?;
        if tasks.is_empty() {
            info!("No tasks to run");
            return Ok(tally);
        }

        let pool_size = self.config.effective_pool_size(tasks.len());
        info!(tasks = tasks.len(), pool_size, "Starting workers");

        let mut queue: VecDeque<TaskRecord> = tasks.into();
        let mut running: JoinSet<TaskResult> = JoinSet::new();
        self.fill(&mut running, &mut queue, pool_size);

        tokio::pin!(shutdown);
        let mut abort: Option<String> = None;

        while abort.is_none() {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("Shutdown requested");
                    abort = Some("shutdown requested".to_string());
                }
                joined = running.join_next() => {
                    let Some(joined) = joined else {
                        break;
                    };
                    if let Err(reason) = self.handle(joined, &mut tally) {
                        abort = Some(reason);
                    } else {
                        self.fill(&mut running, &mut queue, pool_size);
                    }
                }
            }
        }

        if let Some(reason) = abort {
            self.wind_down(&reason, &mut running, &mut queue, &mut tally).await;
        }

        info!(
            total = tally.total,
            finished = tally.finished,
            dropped = tally.dropped,
            failed = tally.failed,
            interrupted = tally.interrupted,
            "Migration run ended"
        );
        Ok(tally)
    }

    fn fill(&self, running: &mut JoinSet<TaskResult>, queue: &mut VecDeque<TaskRecord>, pool_size: usize) {
        while running.len() < pool_size {
            let Some(task) = queue.pop_front() else {
                return;
            };
            let launcher = Arc::clone(&self.launcher);
            running.spawn(async move {
                let result = launcher.launch(&task).await;
                (task, result)
            });
        }
    }

    /// Count one completion. Returns the abort reason on orchestration errors.
    fn handle(
        &self,
        joined: Result<TaskResult, tokio::task::JoinError>,
        tally: &mut MigrationTally,
    ) -> Result<(), String> {
        let outcome = match joined {
            Ok((task, Ok(status))) => {
                info!(task_id = task.id, index = %task.source_index, shard = task.source_shard, status = %status, "Task completed");
                tally.record(status);
                Ok(())
            }
            Ok((task, Err(e))) if e.is_task_failure() => {
                error!(task_id = task.id, index = %task.source_index, shard = task.source_shard, error = %e, "Task failed");
                tally.record(CheckpointStatus::Failed);
                Ok(())
            }
            Ok((task, Err(e))) => {
                error!(task_id = task.id, error = %e, "Failed to run task");
                tally.record(CheckpointStatus::Failed);
                Err(e.to_string())
            }
            Err(e) => {
                error!(error = %e, "Task runner panicked");
                tally.record(CheckpointStatus::Failed);
                Err(e.to_string())
            }
        };
        self.report(tally);
        outcome
    }

    async fn wind_down(
        &self,
        reason: &str,
        running: &mut JoinSet<TaskResult>,
        queue: &mut VecDeque<TaskRecord>,
        tally: &mut MigrationTally,
    ) {
        error!(reason = %reason, queued = queue.len(), running = running.len(), "Aborting migration");
        if let Err(e) = self.flag.raise() {
            error!(error = %e, "Failed to raise cancellation flag");
        }
        queue.clear();

        let grace = self.config.grace_period();
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = running.join_next().await {
                // Already aborting; further orchestration errors change nothing.
                let _ = self.handle(joined, tally);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = running.len(),
                grace_secs = grace.as_secs(),
                "Workers still running after grace period, no longer waiting"
            );
            running.detach_all();
        }
    }

    fn report(&self, tally: &MigrationTally) {
        if let Some(callback) = &self.on_progress {
            callback(tally);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::testing::fixtures;

    /// Launcher that sleeps, tracks concurrency and honours the flag at start.
    struct ScriptedLauncher {
        flag: CancelFlag,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        launched: AtomicUsize,
        outcomes: Mutex<Vec<(u64, Result<CheckpointStatus, &'static str>)>>,
    }

    impl ScriptedLauncher {
        fn new(flag: CancelFlag, delay: Duration) -> Self {
            Self {
                flag,
                delay,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                launched: AtomicUsize::new(0),
                outcomes: Mutex::new(Vec::new()),
            }
        }

        fn outcome_for(&self, task_id: u64, outcome: Result<CheckpointStatus, &'static str>) {
            self.outcomes.lock().unwrap().push((task_id, outcome));
        }
    }

    #[async_trait]
    impl TaskLauncher for ScriptedLauncher {
        async fn launch(&self, task: &TaskRecord) -> Result<CheckpointStatus, LaunchError> {
            if self.flag.is_raised() {
                return Ok(CheckpointStatus::Interrupted);
            }
            self.launched.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let scripted = self
                .outcomes
                .lock()
                .unwrap()
                .iter()
                .find(|(id, _)| *id == task.id)
                .map(|(_, outcome)| *outcome);
            match scripted {
                Some(Ok(status)) => Ok(status),
                Some(Err("spawn")) => Err(LaunchError::Spawn {
                    task_id: task.id,
                    reason: "spawn".to_string(),
                }),
                Some(Err(reason)) => Err(LaunchError::WorkerFailed {
                    task_id: task.id,
                    reason: reason.to_string(),
                }),
                None if self.flag.is_raised() => Ok(CheckpointStatus::Interrupted),
                None => Ok(CheckpointStatus::Finished),
            }
        }
    }

    fn tasks(n: u64) -> Vec<TaskRecord> {
        (0..n).map(|i| fixtures::task(i, "a", i as u32, "store1")).collect()
    }

    fn runner(dir: &TempDir, pool_size: usize, launcher: Arc<ScriptedLauncher>) -> MigrationRunner {
        let config = RunnerConfig {
            pool_size,
            grace_period_secs: 10,
        };
        MigrationRunner::new(config, launcher, CancelFlag::new(dir.path().join("shutdown.lock")))
    }

    fn never() -> std::future::Pending<()> {
        std::future::pending()
    }

    #[tokio::test]
    async fn test_pool_is_bounded_by_task_count() {
        let dir = TempDir::new().unwrap();
        let flag = CancelFlag::new(dir.path().join("shutdown.lock"));
        let launcher = Arc::new(ScriptedLauncher::new(flag, Duration::from_millis(50)));

        let tally = runner(&dir, 10, launcher.clone())
            .run(tasks(3), never())
            .await
            .unwrap();

        assert_eq!(tally.finished, 3);
        assert!(tally.is_complete());
        assert!(launcher.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_pool_size_limits_concurrency() {
        let dir = TempDir::new().unwrap();
        let flag = CancelFlag::new(dir.path().join("shutdown.lock"));
        let launcher = Arc::new(ScriptedLauncher::new(flag, Duration::from_millis(20)));

        let tally = runner(&dir, 2, launcher.clone())
            .run(tasks(7), never())
            .await
            .unwrap();

        assert_eq!(tally.finished, 7);
        assert!(launcher.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_run_clears_stale_flag() {
        let dir = TempDir::new().unwrap();
        let flag = CancelFlag::new(dir.path().join("shutdown.lock"));
        flag.raise().unwrap();
        let launcher = Arc::new(ScriptedLauncher::new(flag.clone(), Duration::ZERO));

        let tally = runner(&dir, 10, launcher).run(Vec::new(), never()).await.unwrap();
        assert_eq!(tally, MigrationTally::new(0));
        assert!(!flag.is_raised());
    }

    #[tokio::test]
    async fn test_stale_flag_does_not_suppress_run() {
        let dir = TempDir::new().unwrap();
        let flag = CancelFlag::new(dir.path().join("shutdown.lock"));
        flag.raise().unwrap();
        let launcher = Arc::new(ScriptedLauncher::new(flag, Duration::ZERO));

        let tally = runner(&dir, 4, launcher).run(tasks(4), never()).await.unwrap();
        assert_eq!(tally.finished, 4);
    }

    #[tokio::test]
    async fn test_outcomes_are_tallied() {
        let dir = TempDir::new().unwrap();
        let flag = CancelFlag::new(dir.path().join("shutdown.lock"));
        let launcher = Arc::new(ScriptedLauncher::new(flag, Duration::ZERO));
        launcher.outcome_for(1, Ok(CheckpointStatus::Dropped));
        launcher.outcome_for(2, Err("boom"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let tally = runner(&dir, 2, launcher)
            .with_progress(Arc::new(move |t: &MigrationTally| sink.lock().unwrap().push(*t)))
            .run(tasks(4), never())
            .await
            .unwrap();

        assert_eq!(tally.finished, 2);
        assert_eq!(tally.dropped, 1);
        assert_eq!(tally.failed, 1);
        assert!(!tally.is_complete());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen.last().copied(), Some(tally));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_queued_tasks() {
        let dir = TempDir::new().unwrap();
        let flag = CancelFlag::new(dir.path().join("shutdown.lock"));
        let launcher = Arc::new(ScriptedLauncher::new(flag.clone(), Duration::from_millis(200)));

        let shutdown = tokio::time::sleep(Duration::from_millis(50));
        let tally = runner(&dir, 2, launcher.clone())
            .run(tasks(6), shutdown)
            .await
            .unwrap();

        assert!(flag.is_raised());
        assert_eq!(launcher.launched.load(Ordering::SeqCst), 2);
        // The two running tasks see the flag when they wake up.
        assert_eq!(tally.interrupted, 2);
        assert_eq!(tally.completed(), 2);
        assert!(!tally.is_complete());
    }

    #[tokio::test]
    async fn test_spawn_error_aborts_run() {
        let dir = TempDir::new().unwrap();
        let flag = CancelFlag::new(dir.path().join("shutdown.lock"));
        let launcher = Arc::new(ScriptedLauncher::new(flag.clone(), Duration::ZERO));
        launcher.outcome_for(0, Err("spawn"));

        let tally = runner(&dir, 1, launcher.clone())
            .run(tasks(5), never())
            .await
            .unwrap();

        assert!(flag.is_raised());
        assert_eq!(tally.failed, 1);
        assert_eq!(launcher.launched.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stragglers_are_abandoned_after_grace_period() {
        let dir = TempDir::new().unwrap();
        let flag = CancelFlag::new(dir.path().join("shutdown.lock"));
        let launcher = Arc::new(ScriptedLauncher::new(flag, Duration::from_secs(30)));
        let runner = MigrationRunner::new(
            RunnerConfig {
                pool_size: 1,
                grace_period_secs: 0,
            },
            launcher,
            CancelFlag::new(dir.path().join("shutdown.lock")),
        );

        let tally = tokio::time::timeout(
            Duration::from_secs(5),
            runner.run(tasks(1), tokio::time::sleep(Duration::from_millis(10))),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(tally.completed(), 0);
    }
}
