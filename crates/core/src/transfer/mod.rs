//! Per-shard resumable transfer.
//!
//! A [`TransferTask`] scans one shard in sequence-number order, writes the documents to the
//! task's logstore in bounded batches and commits a [`ShardCursor`] after every
//! page, so a rerun of the same task id continues where the last one stopped.

mod batch;
mod cursor;
pub mod document;
mod task;
mod types;
mod worker;

pub use batch::{LogBatcher, MAX_BATCH_BYTES, MAX_BATCH_LINES};
pub use cursor::{CursorStore, ShardCursor};
pub use task::TransferTask;
pub use types::*;
pub use worker::run_worker;
