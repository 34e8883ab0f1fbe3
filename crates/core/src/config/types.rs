use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_POOL_SIZE: usize = 10;
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_WAIT_TIME_SECS: u64 = 60;

const CONFIG_FILE: &str = "config.json";
const TASKS_FILE: &str = "tasks.json";
const SHUTDOWN_FLAG_FILE: &str = "shutdown.lock";
const CHECKPOINT_DIR: &str = "ckpt";

/// Effective migration configuration, persisted in the cache directory so an
/// interrupted run can be resumed without re-specifying every option.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationConfig {
    /// Cache directory this configuration was loaded from. Not persisted.
    #[serde(skip)]
    pub cache_path: PathBuf,

    /// Log service endpoint (e.g., "cn-hangzhou.log.aliyuncs.com").
    pub endpoint: String,
    /// Log service project receiving the migrated documents.
    pub project_name: String,
    /// Comma-separated list of source nodes (e.g., "localhost:9200,other:9200").
    pub hosts: String,
    /// Comma-separated list of source index names; all indexes when unset.
    #[serde(default)]
    pub indexes: Option<String>,
    /// Query body used to filter documents (e.g., '{"query": {"match_all": {}}}').
    #[serde(default)]
    pub query: Option<String>,
    /// Document field used as the log time.
    #[serde(default)]
    pub time_reference: Option<String>,
    /// Logstore to index-pattern mapping (e.g., '{"logstore1": "my_index*"}').
    #[serde(default)]
    pub logstore_index_mappings: Option<String>,
    /// Value of the log `source` field.
    #[serde(default)]
    pub source: Option<String>,
    /// Value of the log `topic` field.
    #[serde(default)]
    pub topic: Option<String>,
    /// Number of worker processes.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Maximum number of logs written in one batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between provisioning and transfer, absorbing propagation delay.
    #[serde(default = "default_wait_time")]
    pub wait_time_in_secs: u64,
    /// Whether logstores and indexes are created automatically.
    #[serde(default = "default_auto_creation")]
    pub auto_creation: bool,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_wait_time() -> u64 {
    DEFAULT_WAIT_TIME_SECS
}

fn default_auto_creation() -> bool {
    true
}

impl MigrationConfig {
    pub fn config_file(&self) -> PathBuf {
        config_file_in(&self.cache_path)
    }

    /// Task ledger location.
    pub fn tasks_file(&self) -> PathBuf {
        self.cache_path.join(TASKS_FILE)
    }

    /// Cross-process cancellation marker.
    pub fn shutdown_flag(&self) -> PathBuf {
        self.cache_path.join(SHUTDOWN_FLAG_FILE)
    }

    /// Root directory of per-task cursors.
    pub fn ckpt_path(&self) -> PathBuf {
        ckpt_path_in(&self.cache_path)
    }

    /// Source index filter, `None` when every index should be considered.
    pub fn index_filter(&self) -> Option<&str> {
        self.indexes.as_deref().filter(|s| !s.trim().is_empty())
    }
}

pub(crate) fn config_file_in(cache_path: &Path) -> PathBuf {
    cache_path.join(CONFIG_FILE)
}

pub(crate) fn ckpt_path_in(cache_path: &Path) -> PathBuf {
    cache_path.join(CHECKPOINT_DIR)
}

/// Values supplied on the command line for this run.
///
/// Only fields that are present and non-empty take part in the merge.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logstore_index_mappings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_time_in_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_creation: Option<bool>,
}

impl ConfigOverrides {
    /// Drops empty strings so they never replace a cached value.
    pub fn non_empty(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        Self {
            endpoint: keep(self.endpoint),
            project_name: keep(self.project_name),
            hosts: keep(self.hosts),
            indexes: keep(self.indexes),
            query: keep(self.query),
            time_reference: keep(self.time_reference),
            logstore_index_mappings: keep(self.logstore_index_mappings),
            source: keep(self.source),
            topic: keep(self.topic),
            pool_size: self.pool_size,
            batch_size: self.batch_size,
            wait_time_in_secs: self.wait_time_in_secs,
            auto_creation: self.auto_creation,
        }
    }
}

/// Environment variable carrying the access key id.
pub const ACCESS_KEY_ID_ENV: &str = "ESMIGRATE_ACCESS_KEY_ID";
/// Environment variable carrying the access key secret.
pub const ACCESS_KEY_ENV: &str = "ESMIGRATE_ACCESS_KEY";

/// Log service credentials. Never written to the configuration cache.
#[derive(Clone, Default)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key: access_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_configured", &!self.access_key.is_empty())
            .finish()
    }
}
