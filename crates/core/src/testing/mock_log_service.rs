//! Mock log service for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::logservice::{
    IndexConfig, LogGroup, LogItem, LogService, LogServiceError, INDEX_ALREADY_EXIST,
    LOGSTORE_ALREADY_EXIST,
};

/// A recorded log service call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogServiceCall {
    CreateLogstore(String),
    CreateIndex(String),
    UpdateIndex(String),
    PutLogs { logstore: String, count: usize },
}

/// Mock implementation of the LogService trait.
///
/// Behaves like a single project:
/// - Creating an existing logstore or index fails with the service's
///   "already exists" error codes
/// - Written log groups are kept per logstore
/// - Every call is recorded; failures can be injected per operation
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockLogService {
    /// Logstores and their retention.
    logstores: Arc<RwLock<BTreeMap<String, u32>>>,
    /// Index configuration by logstore.
    indexes: Arc<RwLock<BTreeMap<String, IndexConfig>>>,
    /// Written groups by logstore.
    groups: Arc<RwLock<HashMap<String, Vec<LogGroup>>>>,
    /// Recorded calls, in order.
    calls: Arc<RwLock<Vec<LogServiceCall>>>,
    /// If set, `create_logstore` fails with this error.
    create_logstore_error: Arc<RwLock<Option<LogServiceError>>>,
    /// If set, `create_index` fails with this error.
    create_index_error: Arc<RwLock<Option<LogServiceError>>>,
    /// If set, every `put_logs` fails with this error.
    put_logs_error: Arc<RwLock<Option<LogServiceError>>>,
}

fn already_exists(code: &str, what: &str) -> LogServiceError {
    LogServiceError::Api {
        status: 400,
        code: code.to_string(),
        message: format!("{} already exists", what),
    }
}

impl MockLogService {
    /// Create a new mock log service with an empty project.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-create a logstore.
    pub async fn add_logstore(&self, logstore: &str, ttl_days: u32) {
        self.logstores
            .write()
            .await
            .insert(logstore.to_string(), ttl_days);
    }

    pub async fn fail_create_logstore(&self, error: LogServiceError) {
        *self.create_logstore_error.write().await = Some(error);
    }

    pub async fn fail_create_index(&self, error: LogServiceError) {
        *self.create_index_error.write().await = Some(error);
    }

    pub async fn fail_put_logs(&self, error: LogServiceError) {
        *self.put_logs_error.write().await = Some(error);
    }

    /// Retention of `logstore`, `None` when it does not exist.
    pub async fn logstore_ttl(&self, logstore: &str) -> Option<u32> {
        self.logstores.read().await.get(logstore).copied()
    }

    /// Names of all logstores.
    pub async fn logstores(&self) -> Vec<String> {
        self.logstores.read().await.keys().cloned().collect()
    }

    pub async fn index_config(&self, logstore: &str) -> Option<IndexConfig> {
        self.indexes.read().await.get(logstore).cloned()
    }

    /// Groups written to `logstore`, in write order.
    pub async fn recorded_groups(&self, logstore: &str) -> Vec<LogGroup> {
        self.groups
            .read()
            .await
            .get(logstore)
            .cloned()
            .unwrap_or_default()
    }

    /// All log items written to `logstore`, in write order.
    pub async fn written_logs(&self, logstore: &str) -> Vec<LogItem> {
        self.recorded_groups(logstore)
            .await
            .into_iter()
            .flat_map(|g| g.logs)
            .collect()
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<LogServiceCall> {
        self.calls.read().await.clone()
    }

    async fn record(&self, call: LogServiceCall) {
        self.calls.write().await.push(call);
    }
}

#[async_trait]
impl LogService for MockLogService {
    async fn create_logstore(&self, logstore: &str, ttl_days: u32) -> Result<(), LogServiceError> {
        self.record(LogServiceCall::CreateLogstore(logstore.to_string()))
            .await;
        if let Some(error) = self.create_logstore_error.read().await.clone() {
            return Err(error);
        }

        let mut logstores = self.logstores.write().await;
        if logstores.contains_key(logstore) {
            return Err(already_exists(LOGSTORE_ALREADY_EXIST, logstore));
        }
        logstores.insert(logstore.to_string(), ttl_days);
        Ok(())
    }

    async fn create_index(&self, logstore: &str, config: &IndexConfig) -> Result<(), LogServiceError> {
        self.record(LogServiceCall::CreateIndex(logstore.to_string()))
            .await;
        if let Some(error) = self.create_index_error.read().await.clone() {
            return Err(error);
        }

        let mut indexes = self.indexes.write().await;
        if indexes.contains_key(logstore) {
            return Err(already_exists(INDEX_ALREADY_EXIST, logstore));
        }
        indexes.insert(logstore.to_string(), config.clone());
        Ok(())
    }

    async fn update_index(&self, logstore: &str, config: &IndexConfig) -> Result<(), LogServiceError> {
        self.record(LogServiceCall::UpdateIndex(logstore.to_string()))
            .await;
        self.indexes
            .write()
            .await
            .insert(logstore.to_string(), config.clone());
        Ok(())
    }

    async fn put_logs(&self, logstore: &str, group: &LogGroup) -> Result<(), LogServiceError> {
        self.record(LogServiceCall::PutLogs {
            logstore: logstore.to_string(),
            count: group.logs.len(),
        })
        .await;
        if let Some(error) = self.put_logs_error.read().await.clone() {
            return Err(error);
        }

        self.groups
            .write()
            .await
            .entry(logstore.to_string())
            .or_default()
            .push(group.clone());
        Ok(())
    }
}
