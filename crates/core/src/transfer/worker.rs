use std::sync::Arc;

use tracing::info;

use super::{CheckpointStatus, CursorStore, TransferError, TransferSettings, TransferTask};
use crate::cancel::CancelFlag;
use crate::config::{Credentials, MigrationConfig};
use crate::ledger::TaskRecord;
use crate::logservice::SlsClient;
use crate::source::ElasticsearchClient;

/// Entry point of a worker process: build this task's own clients and run it.
///
/// No client is constructed when cancellation is already requested.
pub async fn run_worker(
    config: &MigrationConfig,
    credentials: &Credentials,
    task: &TaskRecord,
    flag: &CancelFlag,
) -> Result<CheckpointStatus, TransferError> {
    if flag.is_raised() {
        info!(task_id = task.id, "Cancellation requested, task not started");
        return Ok(CheckpointStatus::Interrupted);
    }

    let settings = TransferSettings::from_config(config)?;
    let source = ElasticsearchClient::new(&config.hosts)
        .map_err(|e| TransferError::Setup(e.to_string()))?;
    let log_service = SlsClient::new(&config.endpoint, &config.project_name, credentials.clone())
        .map_err(|e| TransferError::Setup(e.to_string()))?;

    TransferTask::new(
        task.clone(),
        Arc::new(source),
        Arc::new(log_service),
        CursorStore::new(config.ckpt_path()),
        settings,
        flag.clone(),
    )
    .run()
    .await
}
