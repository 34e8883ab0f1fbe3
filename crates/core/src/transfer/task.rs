use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::batch::LogBatcher;
use super::cursor::{CursorStore, ShardCursor};
use super::document::{now_secs, to_log_item};
use super::{CheckpointStatus, TransferError, TransferSettings};
use crate::cancel::CancelFlag;
use crate::ledger::TaskRecord;
use crate::logservice::{LogGroup, LogItem, LogService};
use crate::mapping::is_valid_logstore_name;
use crate::source::{ScanRequest, SourceCluster, SourceError};

/// Transfers one shard into its logstore, resuming from the committed cursor.
pub struct TransferTask {
    task: TaskRecord,
    source: Arc<dyn SourceCluster>,
    log_service: Arc<dyn LogService>,
    cursors: CursorStore,
    settings: TransferSettings,
    flag: CancelFlag,
}

impl TransferTask {
    pub fn new(
        task: TaskRecord,
        source: Arc<dyn SourceCluster>,
        log_service: Arc<dyn LogService>,
        cursors: CursorStore,
        settings: TransferSettings,
        flag: CancelFlag,
    ) -> Self {
        Self {
            task,
            source,
            log_service,
            cursors,
            settings,
            flag,
        }
    }

    /// Run the transfer to a terminal status.
    pub async fn run(&self) -> Result<CheckpointStatus, TransferError> {
        if self.flag.is_raised() {
            info!(task_id = self.task.id, "Cancellation requested, task not started");
            return Ok(CheckpointStatus::Interrupted);
        }

        match self.transfer().await {
            Ok(status) => {
                info!(
                    task_id = self.task.id,
                    index = %self.task.source_index,
                    shard = self.task.source_shard,
                    logstore = %self.task.destination_store,
                    status = %status,
                    "Task done"
                );
                Ok(status)
            }
            Err(e) => {
                error!(
                    task_id = self.task.id,
                    index = %self.task.source_index,
                    shard = self.task.source_shard,
                    logstore = %self.task.destination_store,
                    error = %e,
                    "Task failed"
                );
                Err(e)
            }
        }
    }

    async fn transfer(&self) -> Result<CheckpointStatus, TransferError> {
        let task = &self.task;
        if !is_valid_logstore_name(&task.destination_store) {
            warn!(
                task_id = task.id,
                logstore = %task.destination_store,
                "Invalid logstore name, dropping task"
            );
            return Ok(CheckpointStatus::Dropped);
        }

        let mut cursor = self.cursors.load(task.id).await?;
        if cursor.completed {
            debug!(task_id = task.id, "Cursor already completed");
            return Ok(CheckpointStatus::Finished);
        }
        if cursor.transferred > 0 {
            info!(
                task_id = task.id,
                transferred = cursor.transferred,
                "Resuming from cursor"
            );
        }

        let mut batcher = LogBatcher::new(self.settings.batch_size);
        let page_size = batcher.max_lines();

        loop {
            if self.flag.is_raised() {
                info!(
                    task_id = task.id,
                    transferred = cursor.transferred,
                    "Cancellation requested, stopping"
                );
                return Ok(CheckpointStatus::Interrupted);
            }

            let request = ScanRequest {
                index: task.source_index.clone(),
                shard: task.source_shard,
                query: self.settings.query.clone(),
                size: page_size,
                search_after: cursor.search_after.clone(),
            };
            let page = match self.source.scan(&request).await {
                Ok(page) => page,
                Err(SourceError::IndexNotFound(index)) => {
                    warn!(task_id = task.id, index = %index, "Source index gone, dropping task");
                    return Ok(CheckpointStatus::Dropped);
                }
                Err(e) => return Err(e.into()),
            };

            let Some(last) = page.documents.last() else {
                return self.complete(cursor).await;
            };
            if last.sort.is_empty() {
                return Err(SourceError::InvalidResponse(
                    "scan hit carries no sort values".to_string(),
                )
                .into());
            }
            let next_after = last.sort.clone();
            let count = page.documents.len();

            let fallback_time = now_secs();
            for doc in &page.documents {
                let item = to_log_item(doc, self.settings.time_reference.as_deref(), fallback_time);
                if let Some(batch) = batcher.push(item) {
                    self.write(batch).await?;
                }
            }
            if let Some(batch) = batcher.take() {
                self.write(batch).await?;
            }

            cursor.search_after = Some(next_after);
            cursor.transferred += count as u64;
            self.cursors.save(&cursor).await?;
            debug!(task_id = task.id, transferred = cursor.transferred, "Committed cursor");

            if count < page_size {
                return self.complete(cursor).await;
            }
        }
    }

    async fn complete(&self, mut cursor: ShardCursor) -> Result<CheckpointStatus, TransferError> {
        cursor.completed = true;
        self.cursors.save(&cursor).await?;
        Ok(CheckpointStatus::Finished)
    }

    async fn write(&self, logs: Vec<LogItem>) -> Result<(), TransferError> {
        let group = LogGroup {
            topic: self.settings.topic.clone(),
            source: self.settings.source.clone(),
            logs,
        };
        self.log_service
            .put_logs(&self.task.destination_store, &group)
            .await
            .map_err(|e| TransferError::Write {
                logstore: self.task.destination_store.clone(),
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logservice::LogServiceError;
    use crate::testing::{fixtures, MockLogService, MockSourceCluster};
    use serde_json::json;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        source: MockSourceCluster,
        logs: MockLogService,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                source: MockSourceCluster::new(),
                logs: MockLogService::new(),
            }
        }

        fn flag(&self) -> CancelFlag {
            CancelFlag::new(self.dir.path().join("shutdown.lock"))
        }

        fn cursors(&self) -> CursorStore {
            CursorStore::new(self.dir.path().join("ckpt"))
        }

        fn task(&self, record: TaskRecord, batch_size: usize) -> TransferTask {
            let settings = TransferSettings {
                batch_size,
                time_reference: Some("ts".to_string()),
                source: Some("es".to_string()),
                topic: Some("migrated".to_string()),
                query: None,
            };
            TransferTask::new(
                record,
                Arc::new(self.source.clone()),
                Arc::new(self.logs.clone()),
                self.cursors(),
                settings,
                self.flag(),
            )
        }
    }

    #[tokio::test]
    async fn test_transfers_all_documents() {
        let h = Harness::new();
        h.source.add_primary_shards("logs", 1).await;
        h.source.add_documents("logs", 0, fixtures::documents(5)).await;

        let status = h
            .task(fixtures::task(0, "logs", 0, "store1"), 2)
            .run()
            .await
            .unwrap();

        assert_eq!(status, CheckpointStatus::Finished);
        let written = h.logs.written_logs("store1").await;
        assert_eq!(written.len(), 5);
        assert_eq!(written[0].time, 1_700_000_000);

        let groups = h.logs.recorded_groups("store1").await;
        assert!(groups.iter().all(|g| g.logs.len() <= 2));
        assert_eq!(groups[0].topic.as_deref(), Some("migrated"));
        assert_eq!(groups[0].source.as_deref(), Some("es"));

        let cursor = h.cursors().load(0).await.unwrap();
        assert!(cursor.completed);
        assert_eq!(cursor.transferred, 5);
    }

    #[tokio::test]
    async fn test_raised_flag_short_circuits() {
        let h = Harness::new();
        h.source.add_primary_shards("logs", 1).await;
        h.source.add_documents("logs", 0, fixtures::documents(3)).await;
        h.flag().raise().unwrap();

        let status = h
            .task(fixtures::task(0, "logs", 0, "store1"), 10)
            .run()
            .await
            .unwrap();

        assert_eq!(status, CheckpointStatus::Interrupted);
        assert!(h.source.recorded_scans().await.is_empty());
        assert!(h.logs.written_logs("store1").await.is_empty());
    }

    #[tokio::test]
    async fn test_flag_is_checked_between_pages() {
        let h = Harness::new();
        h.source.add_primary_shards("logs", 1).await;
        h.source.add_documents("logs", 0, fixtures::documents(6)).await;
        h.source.raise_after_scans(h.flag(), 1).await;

        let status = h
            .task(fixtures::task(0, "logs", 0, "store1"), 2)
            .run()
            .await
            .unwrap();

        assert_eq!(status, CheckpointStatus::Interrupted);
        assert_eq!(h.logs.written_logs("store1").await.len(), 2);
        let cursor = h.cursors().load(0).await.unwrap();
        assert_eq!(cursor.transferred, 2);
        assert!(!cursor.completed);
    }

    #[tokio::test]
    async fn test_resumes_from_cursor() {
        let h = Harness::new();
        h.source.add_primary_shards("logs", 1).await;
        h.source.add_documents("logs", 0, fixtures::documents(6)).await;
        h.source.raise_after_scans(h.flag(), 1).await;

        let task = h.task(fixtures::task(0, "logs", 0, "store1"), 2);
        assert_eq!(task.run().await.unwrap(), CheckpointStatus::Interrupted);

        h.flag().clear().unwrap();
        h.source.clear_raise_after().await;
        assert_eq!(task.run().await.unwrap(), CheckpointStatus::Finished);

        let ids: Vec<String> = h
            .logs
            .written_logs("store1")
            .await
            .iter()
            .map(|item| item.contents[0].1.clone())
            .collect();
        let unique: std::collections::BTreeSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), 6);
        assert_eq!(unique.len(), 6);
    }

    #[tokio::test]
    async fn test_completed_cursor_skips_scan() {
        let h = Harness::new();
        h.source.add_primary_shards("logs", 1).await;
        h.cursors()
            .save(&ShardCursor {
                task_id: 0,
                completed: true,
                ..ShardCursor::default()
            })
            .await
            .unwrap();

        let status = h
            .task(fixtures::task(0, "logs", 0, "store1"), 10)
            .run()
            .await
            .unwrap();
        assert_eq!(status, CheckpointStatus::Finished);
        assert!(h.source.recorded_scans().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_logstore_is_dropped() {
        let h = Harness::new();
        h.source.add_primary_shards("logs", 1).await;
        let status = h
            .task(fixtures::task(0, "logs", 0, "Bad Store!"), 10)
            .run()
            .await
            .unwrap();
        assert_eq!(status, CheckpointStatus::Dropped);
    }

    #[tokio::test]
    async fn test_missing_index_is_dropped() {
        let h = Harness::new();
        let status = h
            .task(fixtures::task(0, "gone", 0, "store1"), 10)
            .run()
            .await
            .unwrap();
        assert_eq!(status, CheckpointStatus::Dropped);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let h = Harness::new();
        h.source.add_primary_shards("logs", 1).await;
        h.source.add_documents("logs", 0, fixtures::documents(3)).await;
        h.logs
            .fail_put_logs(LogServiceError::Api {
                status: 404,
                code: "LogStoreNotExist".to_string(),
                message: "no such logstore".to_string(),
            })
            .await;

        let err = h
            .task(fixtures::task(0, "logs", 0, "store1"), 10)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Write { .. }));
        assert!(!h.cursors().load(0).await.unwrap().completed);
    }

    #[tokio::test]
    async fn test_query_is_sent_with_scans() {
        let h = Harness::new();
        h.source.add_primary_shards("logs", 1).await;
        let mut task = h.task(fixtures::task(0, "logs", 0, "store1"), 10);
        task.settings.query = Some(json!({"match_all": {}}));

        task.run().await.unwrap();
        let scans = h.source.recorded_scans().await;
        assert_eq!(scans[0].query, Some(json!({"match_all": {}})));
        assert_eq!(scans[0].size, 10);
    }
}
