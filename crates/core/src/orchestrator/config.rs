//! Worker pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{MigrationConfig, DEFAULT_POOL_SIZE};

/// Configuration for the migration runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum number of tasks in flight.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// How long running tasks may take to wind down after an abort (seconds).
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_grace_period() -> u64 {
    10
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            grace_period_secs: default_grace_period(),
        }
    }
}

impl RunnerConfig {
    pub fn from_migration(config: &MigrationConfig) -> Self {
        Self {
            pool_size: config.pool_size,
            ..Self::default()
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Workers actually used for `task_count` tasks.
    pub fn effective_pool_size(&self, task_count: usize) -> usize {
        self.pool_size.max(1).min(task_count)
    }
}
