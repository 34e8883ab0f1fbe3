//! Shard discovery and ledger reconciliation.
//!
//! One task exists per started primary shard. Discovered shards are merged into
//! the task ledger; known shards keep their id and logstore, new shards get the
//! next ids and a logstore from the current mapping rules.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::ledger::{reconcile, LedgerError, ShardKey, TaskLedger, TaskRecord};
use crate::mapping::{IndexLogstoreMappings, MappingError, MappingRules};
use crate::source::{ShardCopy, SourceCluster, SourceError};

/// Prefix of cluster-internal index names.
pub const INTERNAL_INDEX_PREFIX: char = '.';

/// Errors from task discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to list source shards: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("failed to save task ledger: {0}")]
    Ledger(#[from] LedgerError),
}

/// Tasks produced by a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    /// Every task in the ledger, in id order of assignment.
    pub tasks: Vec<TaskRecord>,
    /// Index to logstore assignments as recorded in the ledger.
    pub mappings: IndexLogstoreMappings,
    /// Number of tasks first seen in this run.
    pub added: usize,
}

/// Discovers shard tasks and keeps the ledger current.
pub struct TaskDiscovery {
    source: Arc<dyn SourceCluster>,
    ledger: Arc<dyn TaskLedger>,
}

impl TaskDiscovery {
    pub fn new(source: Arc<dyn SourceCluster>, ledger: Arc<dyn TaskLedger>) -> Self {
        Self { source, ledger }
    }

    /// Discover tasks for `index_filter` and persist the merged ledger.
    pub async fn discover(
        &self,
        index_filter: Option<&str>,
        mapping_rules: Option<&str>,
    ) -> Result<DiscoveryOutcome, DiscoveryError> {
        let rules = MappingRules::parse(mapping_rules)?;
        let filter = index_filter.filter(|f| !f.trim().is_empty());

        let copies = self.source.search_shards(filter).await?;
        let discovered = select_shards(&copies, filter.is_some());

        let existing = match self.ledger.load() {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "Task ledger unreadable, starting from an empty ledger");
                Vec::new()
            }
        };

        let reconciled = reconcile(existing, &discovered, |index| rules.logstore_for(index));
        self.ledger.save(&reconciled.tasks)?;

        info!(
            discovered = discovered.len(),
            added = reconciled.added,
            total = reconciled.tasks.len(),
            "Discovered shard tasks"
        );

        Ok(DiscoveryOutcome {
            mappings: IndexLogstoreMappings::from_tasks(&reconciled.tasks),
            tasks: reconciled.tasks,
            added: reconciled.added,
        })
    }
}

/// Started primaries, sorted and deduplicated. Internal indexes are excluded
/// unless an explicit filter asked for them.
fn select_shards(copies: &[ShardCopy], explicit_filter: bool) -> Vec<ShardKey> {
    copies
        .iter()
        .filter(|c| c.is_started_primary())
        .filter(|c| explicit_filter || !c.index.starts_with(INTERNAL_INDEX_PREFIX))
        .map(|c| ShardKey::new(c.index.clone(), c.shard))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
