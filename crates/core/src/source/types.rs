//! Types for the source cluster abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors from the source cluster.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The requested index does not exist.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// None of the configured hosts accepted a connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// The cluster answered with an error.
    #[error("API error: {0}")]
    ApiError(String),

    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client could not be constructed from the configuration.
    #[error("invalid source configuration: {0}")]
    Config(String),
}

/// One copy (primary or replica) of a shard as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardCopy {
    pub index: String,
    pub shard: u32,
    /// Allocation state, e.g. `STARTED`, `INITIALIZING`, `RELOCATING`, `UNASSIGNED`.
    pub state: String,
    pub primary: bool,
    #[serde(default)]
    pub node: Option<String>,
}

impl ShardCopy {
    /// Only started primaries become migration tasks.
    pub fn is_started_primary(&self) -> bool {
        self.primary && self.state.eq_ignore_ascii_case("STARTED")
    }
}

/// A page request for an ordered scan of one shard.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub index: String,
    pub shard: u32,
    /// Query clause filtering documents; all documents when `None`.
    pub query: Option<Value>,
    /// Maximum documents per page.
    pub size: usize,
    /// Sort values of the last document already consumed.
    pub search_after: Option<Vec<Value>>,
}

/// A document returned by a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub index: String,
    pub id: String,
    pub source: Value,
    /// Sort values identifying this document's position in the scan.
    pub sort: Vec<Value>,
}

/// One page of scan results. An empty page means the shard is exhausted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPage {
    pub documents: Vec<SourceDocument>,
}

/// Read access to the source cluster.
#[async_trait]
pub trait SourceCluster: Send + Sync {
    /// List every shard copy, optionally restricted to a comma-separated index filter.
    async fn search_shards(&self, indexes: Option<&str>) -> Result<Vec<ShardCopy>, SourceError>;

    /// Fetch the mappings of `index`, or `None` when it does not exist.
    async fn get_mappings(&self, index: &str) -> Result<Option<Value>, SourceError>;

    /// Read the next page of an ordered scan.
    async fn scan(&self, request: &ScanRequest) -> Result<ScanPage, SourceError>;
}
