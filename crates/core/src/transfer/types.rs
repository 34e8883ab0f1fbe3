use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::MigrationConfig;
use crate::logservice::LogServiceError;
use crate::source::SourceError;

/// Terminal outcome of one task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    /// Every document of the shard was written.
    Finished,
    /// The shard was skipped on purpose.
    Dropped,
    /// The transfer hit an unrecoverable error.
    Failed,
    /// Cancellation was requested before or during the run.
    Interrupted,
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckpointStatus::Finished => "finished",
            CheckpointStatus::Dropped => "dropped",
            CheckpointStatus::Failed => "failed",
            CheckpointStatus::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// The single line a worker process prints on stdout when it is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub task_id: u64,
    pub status: CheckpointStatus,
}

/// Errors that fail a transfer task.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("source read failed: {0}")]
    Source(#[from] SourceError),

    #[error("write to logstore {logstore} failed: {source}")]
    Write {
        logstore: String,
        #[source]
        source: LogServiceError,
    },

    #[error("failed to persist cursor: {0}")]
    Cursor(#[from] std::io::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("failed to set up clients: {0}")]
    Setup(String),
}

/// Per-task transfer settings derived from the migration configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSettings {
    pub batch_size: usize,
    pub time_reference: Option<String>,
    pub source: Option<String>,
    pub topic: Option<String>,
    /// Query clause sent with every scan.
    pub query: Option<Value>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
            time_reference: None,
            source: None,
            topic: None,
            query: None,
        }
    }
}

impl TransferSettings {
    pub fn from_config(config: &MigrationConfig) -> Result<Self, TransferError> {
        Ok(Self {
            batch_size: config.batch_size,
            time_reference: non_blank(&config.time_reference),
            source: non_blank(&config.source),
            topic: non_blank(&config.topic),
            query: parse_query(config.query.as_deref())?,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

/// Accepts either a full search body (`{"query": {...}}`) or a bare query clause.
fn parse_query(raw: Option<&str>) -> Result<Option<Value>, TransferError> {
    let Some(raw) = raw.filter(|q| !q.trim().is_empty()) else {
        return Ok(None);
    };
    let value: Value =
        serde_json::from_str(raw).map_err(|e| TransferError::InvalidQuery(e.to_string()))?;
    match value {
        Value::Object(mut body) => Ok(Some(
            body.remove("query").unwrap_or(Value::Object(body)),
        )),
        _ => Err(TransferError::InvalidQuery(
            "query must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serializes_lowercase() {
        let report = WorkerReport {
            task_id: 3,
            status: CheckpointStatus::Interrupted,
        };
        let line = serde_json::to_string(&report).unwrap();
        assert_eq!(line, r#"{"task_id":3,"status":"interrupted"}"#);
        assert_eq!(CheckpointStatus::Dropped.to_string(), "dropped");
    }

    #[test]
    fn test_query_body_is_unwrapped() {
        let query = parse_query(Some(r#"{"query": {"match_all": {}}}"#)).unwrap();
        assert_eq!(query, Some(json!({"match_all": {}})));
    }

    #[test]
    fn test_bare_query_clause() {
        let query = parse_query(Some(r#"{"term": {"level": "error"}}"#)).unwrap();
        assert_eq!(query, Some(json!({"term": {"level": "error"}})));
    }

    #[test]
    fn test_blank_and_invalid_queries() {
        assert_eq!(parse_query(None).unwrap(), None);
        assert_eq!(parse_query(Some(" ")).unwrap(), None);
        assert!(parse_query(Some("[1]")).is_err());
        assert!(parse_query(Some("{")).is_err());
    }
}
