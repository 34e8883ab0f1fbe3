//! Migration lifecycle integration tests.
//!
//! These tests drive complete migrations through the manager against mock
//! collaborators: discovery -> provisioning -> worker pool -> tally, including
//! resumption from the same cache directory.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use esmigrate_core::{
    testing::{fixtures, InProcessLauncher, LogServiceCall, MockLogService, MockSourceCluster},
    transfer::{CursorStore, TransferSettings},
    CancelFlag, JsonTaskLedger, MigrationConfig, MigrationManager, MigrationTally, TaskLedger,
};

/// Test helper wiring a manager to mocks under a temporary cache directory.
struct TestHarness {
    source: MockSourceCluster,
    logs: MockLogService,
    config: MigrationConfig,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = fixtures::config(temp_dir.path());
        config.batch_size = 3;
        std::fs::create_dir_all(config.ckpt_path()).expect("Failed to create ckpt dir");

        Self {
            source: MockSourceCluster::new(),
            logs: MockLogService::new(),
            config,
            _temp_dir: temp_dir,
        }
    }

    fn flag(&self) -> CancelFlag {
        CancelFlag::from_config(&self.config)
    }

    fn launcher(&self) -> Arc<InProcessLauncher> {
        let settings =
            TransferSettings::from_config(&self.config).expect("Failed to build transfer settings");
        Arc::new(InProcessLauncher::new(
            Arc::new(self.source.clone()),
            Arc::new(self.logs.clone()),
            CursorStore::new(self.config.ckpt_path()),
            settings,
            self.flag(),
        ))
    }

    fn manager(&self, launcher: Arc<InProcessLauncher>) -> MigrationManager {
        MigrationManager::new(
            self.config.clone(),
            Arc::new(self.source.clone()),
            Arc::new(self.logs.clone()),
            launcher,
        )
    }

    fn ledger(&self) -> JsonTaskLedger {
        JsonTaskLedger::new(self.config.tasks_file())
    }
}

async fn seed_scenario(harness: &TestHarness) {
    harness.source.add_primary_shards("a", 2).await;
    harness.source.add_primary_shards("b", 1).await;
    harness
        .source
        .add_shard(fixtures::shard("a", 0, "STARTED", false))
        .await;
    harness
        .source
        .add_shard(fixtures::shard(".security", 0, "STARTED", true))
        .await;
    harness.source.add_documents("a", 0, fixtures::documents(7)).await;
    harness.source.add_documents("a", 1, fixtures::documents(2)).await;
    harness.source.add_documents("b", 0, fixtures::documents(4)).await;
    harness
        .source
        .set_mappings("a", serde_json::json!({"properties": {"message": {"type": "text"}}}))
        .await;
    harness
        .source
        .set_mappings("b", serde_json::json!({"properties": {"level": {"type": "keyword"}}}))
        .await;
}

#[tokio::test]
async fn test_full_migration() {
    let mut harness = TestHarness::new();
    harness.config.logstore_index_mappings = Some(r#"{"store1": "a*"}"#.to_string());
    seed_scenario(&harness).await;

    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = progress.clone();
    let launcher = harness.launcher();
    let manager = harness
        .manager(launcher.clone())
        .with_progress(Arc::new(move |t: &MigrationTally| sink.lock().unwrap().push(*t)));

    let tally = manager
        .migrate(std::future::pending())
        .await
        .expect("Migration failed");

    assert_eq!(tally.total, 3);
    assert_eq!(tally.finished + tally.dropped, 3);
    assert!(tally.is_complete());
    assert_eq!(progress.lock().unwrap().len(), 3);

    // Ledger: ids 0..3, `a` shards in store1, `b` in its default logstore
    let tasks = harness.ledger().load().expect("Failed to load ledger");
    let summary: Vec<(u64, &str, u32, &str)> = tasks
        .iter()
        .map(|t| {
            (
                t.id,
                t.source_index.as_str(),
                t.source_shard,
                t.destination_store.as_str(),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![(0, "a", 0, "store1"), (1, "a", 1, "store1"), (2, "b", 0, "b-es")]
    );

    // Provisioned both logstores
    assert_eq!(harness.logs.logstores().await, vec!["b-es", "store1"]);
    assert!(harness.logs.index_config("store1").await.is_some());

    // Every document arrived exactly once
    assert_eq!(harness.logs.written_logs("store1").await.len(), 9);
    assert_eq!(harness.logs.written_logs("b-es").await.len(), 4);

    let mut launched = launcher.recorded_launches().await;
    launched.sort();
    assert_eq!(launched, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_rerun_after_completion_writes_nothing_new() {
    let harness = TestHarness::new();
    seed_scenario(&harness).await;

    let first = harness
        .manager(harness.launcher())
        .migrate(std::future::pending())
        .await
        .expect("First run failed");
    assert!(first.is_complete());
    let written = harness.logs.written_logs("a-es").await.len();

    let second = harness
        .manager(harness.launcher())
        .migrate(std::future::pending())
        .await
        .expect("Second run failed");

    assert_eq!(second, first);
    assert_eq!(harness.logs.written_logs("a-es").await.len(), written);
    assert_eq!(harness.ledger().load().unwrap().len(), 3);
}

#[tokio::test]
async fn test_interrupted_run_resumes() {
    let mut harness = TestHarness::new();
    harness.config.pool_size = 1;
    seed_scenario(&harness).await;
    // Cancel in the middle of the first shard.
    harness.source.raise_after_scans(harness.flag(), 1).await;

    let manager = harness.manager(harness.launcher());
    let prepared = manager.prepare().await.expect("Prepare failed");
    assert_eq!(prepared.pool_size, 1);

    // The flag is raised by the source mock, so no external shutdown is needed;
    // the run drains and every task reports `interrupted`.
    let tally = manager
        .run(prepared, std::future::pending())
        .await
        .expect("Run failed");
    assert_eq!(tally.interrupted, 3);
    assert!(!tally.is_complete());

    harness.source.clear_raise_after().await;
    let resumed = harness
        .manager(harness.launcher())
        .migrate(std::future::pending())
        .await
        .expect("Resumed run failed");
    assert_eq!(resumed.finished, 3);

    let ids: std::collections::BTreeSet<String> = harness
        .logs
        .written_logs("a-es")
        .await
        .into_iter()
        .map(|item| item.contents[0].1.clone())
        .collect();
    assert_eq!(ids.len(), 9);
    assert_eq!(harness.logs.written_logs("a-es").await.len(), 9);
}

#[tokio::test]
async fn test_auto_creation_disabled_skips_provisioning() {
    let mut harness = TestHarness::new();
    harness.config.auto_creation = false;
    seed_scenario(&harness).await;

    let tally = harness
        .manager(harness.launcher())
        .migrate(std::future::pending())
        .await
        .expect("Migration failed");

    assert!(tally.is_complete());
    let calls = harness.logs.recorded_calls().await;
    assert!(calls
        .iter()
        .all(|c| matches!(c, LogServiceCall::PutLogs { .. })));
}

#[tokio::test]
async fn test_shutdown_stops_the_run() {
    let mut harness = TestHarness::new();
    harness.config.pool_size = 2;
    harness.config.batch_size = 1;
    seed_scenario(&harness).await;

    let manager = harness.manager(harness.launcher());
    let prepared = manager.prepare().await.expect("Prepare failed");
    let tally = manager
        .run(prepared, async {})
        .await
        .expect("Migration failed");

    assert!(harness.flag().is_raised());
    assert!(tally.completed() <= 2);
    assert!(!tally.is_complete());
}

#[tokio::test]
async fn test_shutdown_during_warmup_reports_untouched_tasks() {
    let mut harness = TestHarness::new();
    harness.config.wait_time_in_secs = 30;
    seed_scenario(&harness).await;

    let launcher = harness.launcher();
    let tally = tokio::time::timeout(
        Duration::from_secs(5),
        harness
            .manager(launcher.clone())
            .migrate(tokio::time::sleep(Duration::from_millis(100))),
    )
    .await
    .expect("Shutdown did not interrupt the warm-up")
    .expect("Migration failed");

    assert_eq!(tally, MigrationTally::new(3));
    assert!(!tally.is_complete());
    assert!(launcher.recorded_launches().await.is_empty());
    assert!(harness.logs.written_logs("a-es").await.is_empty());
}

#[tokio::test]
async fn test_invalid_destination_is_dropped_not_fatal() {
    let mut harness = TestHarness::new();
    harness.config.logstore_index_mappings = Some(r#"{"Bad Store!": "b"}"#.to_string());
    seed_scenario(&harness).await;

    let tally = harness
        .manager(harness.launcher())
        .migrate(std::future::pending())
        .await
        .expect("Migration failed");

    assert_eq!(tally.finished, 2);
    assert_eq!(tally.dropped, 1);
    assert!(tally.is_complete());
    assert_eq!(harness.logs.logstores().await, vec!["a-es"]);
    assert_eq!(harness.logs.written_logs("a-es").await.len(), 9);
}

#[tokio::test]
async fn test_empty_cluster() {
    let harness = TestHarness::new();
    let tally = tokio::time::timeout(
        Duration::from_secs(5),
        harness
            .manager(harness.launcher())
            .migrate(std::future::pending()),
    )
    .await
    .expect("Migration hung")
    .expect("Migration failed");

    assert_eq!(tally, MigrationTally::new(0));
    assert!(harness.ledger().load().unwrap().is_empty());
}
