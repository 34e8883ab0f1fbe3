//! Ledger storage trait and errors.

use thiserror::Error;

use super::TaskRecord;

/// Error type for ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The persisted ledger exists but cannot be decoded.
    #[error("Invalid task cache: {0}")]
    Corrupt(String),

    /// Reading or writing the ledger failed.
    #[error("Task ledger I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for task ledger backends.
///
/// Reads and writes are whole-ledger; only the orchestrator process mutates it.
pub trait TaskLedger: Send + Sync {
    /// Load every record, in ledger order. A missing ledger is empty.
    fn load(&self) -> Result<Vec<TaskRecord>, LedgerError>;

    /// Replace the persisted ledger with `tasks`.
    fn save(&self, tasks: &[TaskRecord]) -> Result<(), LedgerError>;
}
