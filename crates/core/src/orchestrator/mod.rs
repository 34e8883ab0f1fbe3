//! Migration orchestrator.
//!
//! Drives a migration end to end:
//! - **Discovery**: one task per started primary shard, reconciled with the ledger
//! - **Provisioning**: logstores and indexes, when auto creation is enabled
//! - **Transfer**: a bounded pool running one worker process per task

mod config;
mod launcher;
mod manager;
mod runner;
mod types;

pub use config::RunnerConfig;
pub use launcher::{ProcessLauncher, TaskLauncher};
pub use manager::{MigrationManager, PreparedMigration};
pub use runner::MigrationRunner;
pub use types::{LaunchError, MigrationTally, OrchestratorError, ProgressCallback};
