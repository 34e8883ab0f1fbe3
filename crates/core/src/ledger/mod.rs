//! Task ledger: the durable record of every discovered shard task.
//!
//! A `(source_index, source_shard)` pair receives an id and a destination store the
//! first time it is observed; both are kept for the lifetime of the migration.

mod json_store;
mod reconcile;
mod store;
mod types;

pub use json_store::JsonTaskLedger;
pub use reconcile::{reconcile, Reconciled};
pub use store::{LedgerError, TaskLedger};
pub use types::{ShardKey, TaskRecord};
