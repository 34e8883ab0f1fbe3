//! File-based cancellation flag shared by the orchestrator and its workers.
//!
//! The flag is the presence of a file; its content is ignored.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::MigrationConfig;

/// Cross-process cooperative cancellation marker.
#[derive(Debug, Clone)]
pub struct CancelFlag {
    path: PathBuf,
}

impl CancelFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.shutdown_flag())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether cancellation has been requested.
    pub fn is_raised(&self) -> bool {
        self.path.exists()
    }

    /// Request cancellation of every worker sharing this flag.
    pub fn raise(&self) -> std::io::Result<()> {
        if self.is_raised() {
            return Ok(());
        }
        std::fs::write(&self.path, b"")?;
        info!(path = %self.path.display(), "Cancellation requested");
        Ok(())
    }

    /// Remove a flag left over from an earlier run.
    pub fn clear(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                warn!(path = %self.path.display(), "Removed stale cancellation flag");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
