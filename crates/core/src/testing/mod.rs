//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the remote collaborator traits,
//! allowing migrations to be exercised end to end without a search cluster or a
//! log service.
//!
//! # Example
//!
//! ```rust,ignore
//! use esmigrate_core::testing::{fixtures, MockLogService, MockSourceCluster};
//!
//! let source = MockSourceCluster::new();
//! source.add_primary_shards("logs", 2).await;
//! source.add_documents("logs", 0, fixtures::documents(100)).await;
//!
//! let logs = MockLogService::new();
//! // Run a transfer, then inspect:
//! assert_eq!(logs.written_logs("logs").await.len(), 100);
//! ```

mod in_process_launcher;
mod mock_log_service;
mod mock_source_cluster;

pub use in_process_launcher::InProcessLauncher;
pub use mock_log_service::{LogServiceCall, MockLogService};
pub use mock_source_cluster::MockSourceCluster;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::{json, Value};
    use std::path::Path;

    use crate::config::MigrationConfig;
    use crate::ledger::TaskRecord;
    use crate::source::ShardCopy;

    /// Epoch seconds of the first document from [`documents`].
    pub const FIRST_DOCUMENT_TIME: u64 = 1_700_000_000;

    /// Create a shard copy.
    pub fn shard(index: &str, shard: u32, state: &str, primary: bool) -> ShardCopy {
        ShardCopy {
            index: index.to_string(),
            shard,
            state: state.to_string(),
            primary,
            node: Some("node-1".to_string()),
        }
    }

    /// Create a task record.
    pub fn task(id: u64, index: &str, shard: u32, logstore: &str) -> TaskRecord {
        TaskRecord {
            id,
            source_index: index.to_string(),
            source_shard: shard,
            destination_store: logstore.to_string(),
        }
    }

    /// `count` document bodies with a `ts` field one second apart.
    pub fn documents(count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| {
                json!({
                    "ts": FIRST_DOCUMENT_TIME + i as u64,
                    "message": format!("message {}", i),
                    "level": if i % 2 == 0 { "info" } else { "warn" },
                })
            })
            .collect()
    }

    /// Configuration rooted at `cache_path` with local endpoints and no warm-up.
    pub fn config(cache_path: &Path) -> MigrationConfig {
        MigrationConfig {
            cache_path: cache_path.to_path_buf(),
            endpoint: "127.0.0.1:1".to_string(),
            project_name: "test-project".to_string(),
            hosts: "127.0.0.1:1".to_string(),
            indexes: None,
            query: None,
            time_reference: Some("ts".to_string()),
            logstore_index_mappings: None,
            source: None,
            topic: None,
            pool_size: 10,
            batch_size: 1000,
            wait_time_in_secs: 0,
            auto_creation: true,
        }
    }
}
