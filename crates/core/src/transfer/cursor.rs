//! Resumable scan position of one task.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::fsutil::write_atomic_async;

/// Committed progress of a shard scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShardCursor {
    pub task_id: u64,
    /// Sort values of the last document known to be written.
    #[serde(default)]
    pub search_after: Option<Vec<Value>>,
    /// Documents written so far.
    #[serde(default)]
    pub transferred: u64,
    /// Whether the shard has been fully transferred.
    #[serde(default)]
    pub completed: bool,
}

impl ShardCursor {
    pub fn new(task_id: u64) -> Self {
        Self {
            task_id,
            ..Self::default()
        }
    }
}

/// Cursor files under the checkpoint root, one `<task id>.json` per task.
#[derive(Debug, Clone)]
pub struct CursorStore {
    root: PathBuf,
}

impl CursorStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, task_id: u64) -> PathBuf {
        self.root.join(format!("{}.json", task_id))
    }

    /// Load the cursor of `task_id`. Missing or unreadable cursors start over.
    pub async fn load(&self, task_id: u64) -> std::io::Result<ShardCursor> {
        let path = self.path_for(task_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ShardCursor::new(task_id))
            }
            Err(e) => return Err(e),
        };

        match serde_json::from_str::<ShardCursor>(&content) {
            Ok(cursor) if cursor.task_id == task_id => Ok(cursor),
            Ok(cursor) => {
                warn!(
                    task_id,
                    found = cursor.task_id,
                    path = %path.display(),
                    "Cursor belongs to another task, restarting shard"
                );
                Ok(ShardCursor::new(task_id))
            }
            Err(e) => {
                warn!(task_id, path = %path.display(), error = %e, "Corrupt cursor, restarting shard");
                Ok(ShardCursor::new(task_id))
            }
        }
    }

    pub async fn save(&self, cursor: &ShardCursor) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let json = serde_json::to_vec_pretty(cursor)?;
        write_atomic_async(&self.path_for(cursor.task_id), &json).await
    }
}
