//! JSON file ledger backend.

use std::path::{Path, PathBuf};

use super::{LedgerError, TaskLedger, TaskRecord};
use crate::fsutil::{read_or_empty, write_atomic};

/// Ledger persisted as a pretty-printed JSON array (`tasks.json`).
#[derive(Debug, Clone)]
pub struct JsonTaskLedger {
    path: PathBuf,
}

impl JsonTaskLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TaskLedger for JsonTaskLedger {
    fn load(&self) -> Result<Vec<TaskRecord>, LedgerError> {
        let content = read_or_empty(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| LedgerError::Corrupt(e.to_string()))
    }

    fn save(&self, tasks: &[TaskRecord]) -> Result<(), LedgerError> {
        let content = serde_json::to_string_pretty(tasks)
            .map_err(|e| LedgerError::Corrupt(e.to_string()))?;
        write_atomic(&self.path, content.as_bytes())?;
        Ok(())
    }
}
