//! Mock source cluster for testing.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::cancel::CancelFlag;
use crate::mapping::IndexPattern;
use crate::source::{ScanPage, ScanRequest, ShardCopy, SourceCluster, SourceDocument, SourceError};

/// Mock implementation of the SourceCluster trait.
///
/// Provides controllable behavior for testing:
/// - Configurable shard topology, mappings and documents
/// - Scans page through documents in insertion order, resuming after `search_after`
/// - Track shard listings and scans for assertions
/// - Simulate failures and cancellation mid-scan
///
/// Clones share state, so a test can keep a handle after passing one to the code
/// under test.
///
/// # Example
///
/// ```rust,ignore
/// use esmigrate_core::testing::{MockSourceCluster, fixtures};
///
/// let source = MockSourceCluster::new();
/// source.add_primary_shards("logs", 2).await;
/// source.add_documents("logs", 0, fixtures::documents(10)).await;
///
/// let page = source.scan(&request).await?;
/// assert_eq!(source.recorded_scans().await.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSourceCluster {
    /// Shard copies reported by `search_shards`.
    shards: Arc<RwLock<Vec<ShardCopy>>>,
    /// Mappings by index name.
    mappings: Arc<RwLock<HashMap<String, Value>>>,
    /// Documents by (index, shard), in scan order.
    documents: Arc<RwLock<HashMap<(String, u32), Vec<SourceDocument>>>>,
    /// Recorded `search_shards` filters.
    shard_filters: Arc<RwLock<Vec<Option<String>>>>,
    /// Recorded scan requests.
    scans: Arc<RwLock<Vec<ScanRequest>>>,
    /// If set, `search_shards` fails with this error.
    search_shards_error: Arc<RwLock<Option<SourceError>>>,
    /// If set, every scan fails with this error.
    scan_error: Arc<RwLock<Option<SourceError>>>,
    /// Raise this flag once this many scans have been served.
    raise_after: Arc<RwLock<Option<(CancelFlag, usize)>>>,
}

impl MockSourceCluster {
    /// Create a new mock source cluster with no indexes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shard copy to the topology.
    pub async fn add_shard(&self, copy: ShardCopy) {
        self.shards.write().await.push(copy);
    }

    /// Add `count` started primaries (shards `0..count`) for `index`.
    pub async fn add_primary_shards(&self, index: &str, count: u32) {
        let mut shards = self.shards.write().await;
        for shard in 0..count {
            shards.push(ShardCopy {
                index: index.to_string(),
                shard,
                state: "STARTED".to_string(),
                primary: true,
                node: Some("node-1".to_string()),
            });
        }
    }

    /// Set the mappings returned for `index`.
    pub async fn set_mappings(&self, index: &str, mappings: Value) {
        self.mappings
            .write()
            .await
            .insert(index.to_string(), mappings);
    }

    /// Append documents with the given `_source` bodies to a shard.
    ///
    /// Ids are `<index>-<shard>-<position>` and the sort value is the position.
    pub async fn add_documents(&self, index: &str, shard: u32, sources: Vec<Value>) {
        let mut documents = self.documents.write().await;
        let entry = documents.entry((index.to_string(), shard)).or_default();
        for source in sources {
            let position = entry.len();
            entry.push(SourceDocument {
                index: index.to_string(),
                id: format!("{}-{}-{}", index, shard, position),
                source,
                sort: vec![json!(position)],
            });
        }
    }

    /// Make `search_shards` fail.
    pub async fn fail_search_shards(&self, error: SourceError) {
        *self.search_shards_error.write().await = Some(error);
    }

    /// Make every scan fail.
    pub async fn fail_scans(&self, error: SourceError) {
        *self.scan_error.write().await = Some(error);
    }

    /// Raise `flag` once `scans` scans have been served.
    pub async fn raise_after_scans(&self, flag: CancelFlag, scans: usize) {
        *self.raise_after.write().await = Some((flag, scans));
    }

    pub async fn clear_raise_after(&self) {
        *self.raise_after.write().await = None;
    }

    /// Get all recorded `search_shards` filters.
    pub async fn recorded_shard_filters(&self) -> Vec<Option<String>> {
        self.shard_filters.read().await.clone()
    }

    /// Get all recorded scan requests.
    pub async fn recorded_scans(&self) -> Vec<ScanRequest> {
        self.scans.read().await.clone()
    }

    async fn index_exists(&self, index: &str) -> bool {
        self.shards.read().await.iter().any(|s| s.index == index)
            || self.documents.read().await.keys().any(|(i, _)| i == index)
    }
}

#[async_trait]
impl SourceCluster for MockSourceCluster {
    async fn search_shards(&self, indexes: Option<&str>) -> Result<Vec<ShardCopy>, SourceError> {
        self.shard_filters
            .write()
            .await
            .push(indexes.map(str::to_string));

        if let Some(error) = self.search_shards_error.read().await.clone() {
            return Err(error);
        }

        let patterns: Option<Vec<IndexPattern>> = indexes.map(|filter| {
            filter
                .split(',')
                .map(str::trim)
                .filter_map(IndexPattern::new)
                .collect()
        });

        let shards = self.shards.read().await;
        Ok(shards
            .iter()
            .filter(|copy| match &patterns {
                Some(patterns) => patterns.iter().any(|p| p.matches(&copy.index)),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_mappings(&self, index: &str) -> Result<Option<Value>, SourceError> {
        Ok(self.mappings.read().await.get(index).cloned())
    }

    async fn scan(&self, request: &ScanRequest) -> Result<ScanPage, SourceError> {
        let served = {
            let mut scans = self.scans.write().await;
            scans.push(request.clone());
            scans.len()
        };

        if let Some(error) = self.scan_error.read().await.clone() {
            return Err(error);
        }
        if !self.index_exists(&request.index).await {
            return Err(SourceError::IndexNotFound(request.index.clone()));
        }

        let start = request
            .search_after
            .as_ref()
            .and_then(|after| after.first())
            .and_then(Value::as_u64)
            .map_or(0, |position| position as usize + 1);

        let documents = self
            .documents
            .read()
            .await
            .get(&(request.index.clone(), request.shard))
            .map(|docs| docs.iter().skip(start).take(request.size).cloned().collect())
            .unwrap_or_default();

        if let Some((flag, after)) = self.raise_after.read().await.as_ref() {
            if served >= *after {
                let _ = flag.raise();
            }
        }

        Ok(ScanPage { documents })
    }
}
