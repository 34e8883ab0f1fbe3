//! Merge freshly discovered shards into the existing ledger.

use std::collections::HashSet;

use super::{ShardKey, TaskRecord};

/// Result of reconciling discovered shards with the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Existing records followed by the new ones, in id order of assignment.
    pub tasks: Vec<TaskRecord>,
    /// Number of records appended by this reconciliation.
    pub added: usize,
}

/// Append a record for every discovered shard not yet in `existing`.
///
/// Existing records are never modified, so their ids and destinations survive
/// mapping rule changes. `resolve` is only consulted for new shards. New ids
/// continue after the highest id already in the ledger.
pub fn reconcile<F>(existing: Vec<TaskRecord>, discovered: &[ShardKey], resolve: F) -> Reconciled
where
    F: Fn(&str) -> String,
{
    let mut known: HashSet<ShardKey> = existing.iter().map(TaskRecord::key).collect();
    let mut next_id = existing
        .iter()
        .map(|t| t.id + 1)
        .max()
        .unwrap_or(0)
        .max(existing.len() as u64);

    let mut tasks = existing;
    let mut added = 0;
    for key in discovered {
        if !known.insert(key.clone()) {
            continue;
        }
        tasks.push(TaskRecord {
            id: next_id,
            source_index: key.index.clone(),
            source_shard: key.shard,
            destination_store: resolve(&key.index),
        });
        next_id += 1;
        added += 1;
    }

    Reconciled { tasks, added }
}
