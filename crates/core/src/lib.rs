pub mod cancel;
pub mod config;
pub mod discovery;
mod fsutil;
pub mod ledger;
pub mod logservice;
pub mod mapping;
pub mod orchestrator;
pub mod provision;
pub mod schema;
pub mod source;
pub mod testing;
pub mod transfer;

pub use cancel::CancelFlag;
pub use config::{
    load_cached, load_or_init, validate_config, ConfigError, ConfigOverrides, Credentials,
    MigrationConfig,
};
pub use discovery::{DiscoveryError, DiscoveryOutcome, TaskDiscovery};
pub use ledger::{JsonTaskLedger, LedgerError, TaskLedger, TaskRecord};
pub use logservice::{LogService, LogServiceError, SlsClient};
pub use mapping::IndexLogstoreMappings;
pub use orchestrator::{
    LaunchError, MigrationManager, MigrationRunner, MigrationTally, OrchestratorError,
    PreparedMigration, ProcessLauncher, ProgressCallback, RunnerConfig, TaskLauncher,
};
pub use provision::{ProvisionError, ResourceProvisioner};
pub use source::{ElasticsearchClient, SourceCluster, SourceError};
pub use transfer::{run_worker, CheckpointStatus, TransferError, WorkerReport};
