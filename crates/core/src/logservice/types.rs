//! Types for the log service abstraction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOGSTORE_ALREADY_EXIST: &str = "LogStoreAlreadyExist";
pub const INDEX_ALREADY_EXIST: &str = "IndexAlreadyExist";
pub const LOGSTORE_NOT_EXIST: &str = "LogStoreNotExist";

/// Errors from the log service.
#[derive(Debug, Clone, Error)]
pub enum LogServiceError {
    /// The service rejected the request.
    #[error("log service error {code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure.
    #[error("request failed: {0}")]
    Request(String),

    /// Request body could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// Client could not be constructed from the configuration.
    #[error("invalid log service configuration: {0}")]
    Config(String),
}

impl LogServiceError {
    /// Remote error code, when the service returned one.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            LogServiceError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.error_code() == Some(code)
    }
}

/// One log line: a timestamp and ordered key/value contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogItem {
    /// Seconds since the Unix epoch.
    pub time: u32,
    pub contents: Vec<(String, String)>,
}

impl LogItem {
    /// Approximate encoded size in bytes, used for batch limits.
    pub fn approx_size(&self) -> usize {
        self.contents
            .iter()
            .map(|(k, v)| k.len() + v.len() + 8)
            .sum::<usize>()
            + 8
    }
}

/// A batch of logs written in one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogGroup {
    pub topic: Option<String>,
    pub source: Option<String>,
    pub logs: Vec<LogItem>,
}

/// Value type of an indexed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKeyType {
    Text,
    Long,
    Double,
    Json,
}

/// Index settings for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKey {
    #[serde(rename = "type")]
    pub key_type: IndexKeyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Vec<String>>,
    #[serde(
        rename = "caseSensitive",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub case_sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chn: Option<bool>,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub doc_value: bool,
}

/// Full-text index settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexLine {
    pub token: Vec<String>,
    #[serde(rename = "caseSensitive")]
    pub case_sensitive: bool,
    pub chn: bool,
}

/// Index configuration of a logstore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<IndexLine>,
    #[serde(default)]
    pub keys: BTreeMap<String, IndexKey>,
    #[serde(default)]
    pub log_reduce: bool,
}

impl IndexConfig {
    /// Add keys from `other` that are not already configured.
    pub fn merge(&mut self, other: IndexConfig) {
        if self.line.is_none() {
            self.line = other.line;
        }
        for (name, key) in other.keys {
            self.keys.entry(name).or_insert(key);
        }
    }
}

/// Write and management access to the destination log service.
///
/// Implementations are bound to one project.
#[async_trait]
pub trait LogService: Send + Sync {
    /// Create a logstore with the given retention.
    async fn create_logstore(&self, logstore: &str, ttl_days: u32)
        -> Result<(), LogServiceError>;

    /// Create the index configuration of a logstore.
    async fn create_index(&self, logstore: &str, config: &IndexConfig)
        -> Result<(), LogServiceError>;

    /// Replace the index configuration of a logstore.
    async fn update_index(&self, logstore: &str, config: &IndexConfig)
        -> Result<(), LogServiceError>;

    /// Write one batch of logs.
    async fn put_logs(&self, logstore: &str, group: &LogGroup) -> Result<(), LogServiceError>;
}
