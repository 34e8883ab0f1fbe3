//! In-process task launcher for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cancel::CancelFlag;
use crate::ledger::TaskRecord;
use crate::logservice::LogService;
use crate::orchestrator::{LaunchError, TaskLauncher};
use crate::source::SourceCluster;
use crate::transfer::{CheckpointStatus, CursorStore, TransferSettings, TransferTask};

/// Runs each task as a [`TransferTask`] inside the test process.
///
/// Uses the same flag and cursor layout as worker processes, so orchestration can
/// be tested end to end against the mocks. Transfer errors surface as
/// [`LaunchError::WorkerFailed`], as a failing worker process would.
pub struct InProcessLauncher {
    source: Arc<dyn SourceCluster>,
    log_service: Arc<dyn LogService>,
    cursors: CursorStore,
    settings: TransferSettings,
    flag: CancelFlag,
    launched: Arc<RwLock<Vec<u64>>>,
}

impl InProcessLauncher {
    pub fn new(
        source: Arc<dyn SourceCluster>,
        log_service: Arc<dyn LogService>,
        cursors: CursorStore,
        settings: TransferSettings,
        flag: CancelFlag,
    ) -> Self {
        Self {
            source,
            log_service,
            cursors,
            settings,
            flag,
            launched: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Ids of launched tasks, in launch order.
    pub async fn recorded_launches(&self) -> Vec<u64> {
        self.launched.read().await.clone()
    }
}

#[async_trait]
impl TaskLauncher for InProcessLauncher {
    async fn launch(&self, task: &TaskRecord) -> Result<CheckpointStatus, LaunchError> {
        self.launched.write().await.push(task.id);

        let transfer = TransferTask::new(
            task.clone(),
            Arc::clone(&self.source),
            Arc::clone(&self.log_service),
            self.cursors.clone(),
            self.settings.clone(),
            self.flag.clone(),
        );
        transfer
            .run()
            .await
            .map_err(|e| LaunchError::WorkerFailed {
                task_id: task.id,
                reason: e.to_string(),
            })
    }
}
