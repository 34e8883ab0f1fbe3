//! End-to-end migration driver.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::config::RunnerConfig;
use super::launcher::{ProcessLauncher, TaskLauncher};
use super::runner::MigrationRunner;
use super::types::{MigrationTally, OrchestratorError, ProgressCallback};
use crate::cancel::CancelFlag;
use crate::config::{Credentials, MigrationConfig};
use crate::discovery::TaskDiscovery;
use crate::ledger::{JsonTaskLedger, TaskLedger, TaskRecord};
use crate::logservice::{LogService, SlsClient};
use crate::mapping::IndexLogstoreMappings;
use crate::provision::ResourceProvisioner;
use crate::source::{ElasticsearchClient, SourceCluster};

/// Tasks ready to run, with their destinations provisioned.
#[derive(Debug, Clone)]
pub struct PreparedMigration {
    pub tasks: Vec<TaskRecord>,
    pub mappings: IndexLogstoreMappings,
    /// Workers the run will use.
    pub pool_size: usize,
}

/// Runs discovery, provisioning and the worker pool for one cache directory.
pub struct MigrationManager {
    config: MigrationConfig,
    source: Arc<dyn SourceCluster>,
    log_service: Arc<dyn LogService>,
    launcher: Arc<dyn TaskLauncher>,
    on_progress: Option<ProgressCallback>,
}

impl MigrationManager {
    pub fn new(
        config: MigrationConfig,
        source: Arc<dyn SourceCluster>,
        log_service: Arc<dyn LogService>,
        launcher: Arc<dyn TaskLauncher>,
    ) -> Self {
        Self {
            config,
            source,
            log_service,
            launcher,
            on_progress: None,
        }
    }

    /// Build the production clients; tasks run as `program worker ...` processes.
    pub fn from_config(
        config: MigrationConfig,
        credentials: Credentials,
        program: impl Into<PathBuf>,
        worker_args: Vec<String>,
    ) -> Result<Self, OrchestratorError> {
        let source = ElasticsearchClient::new(&config.hosts)
            .map_err(|e| OrchestratorError::Setup(e.to_string()))?;
        let log_service = SlsClient::new(&config.endpoint, &config.project_name, credentials.clone())
            .map_err(|e| OrchestratorError::Setup(e.to_string()))?;
        let launcher = ProcessLauncher::new(program, config.cache_path.clone(), credentials)
            .with_args(worker_args);

        Ok(Self::new(
            config,
            Arc::new(source),
            Arc::new(log_service),
            Arc::new(launcher),
        ))
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Discover tasks and provision their destinations.
    pub async fn prepare(&self) -> Result<PreparedMigration, OrchestratorError> {
        let ledger = Arc::new(JsonTaskLedger::new(self.config.tasks_file()));
        let discovery = TaskDiscovery::new(Arc::clone(&self.source), ledger);
        let outcome = discovery
            .discover(
                self.config.index_filter(),
                self.config.logstore_index_mappings.as_deref(),
            )
            .await?;

        if self.config.auto_creation {
            let provisioner = ResourceProvisioner::new(
                Arc::clone(&self.source),
                Arc::clone(&self.log_service),
                Duration::from_secs(self.config.wait_time_in_secs),
            );
            provisioner.provision(&outcome.mappings).await?;
        } else {
            info!("Auto creation disabled, skipping provisioning");
        }

        let pool_size = RunnerConfig::from_migration(&self.config).effective_pool_size(outcome.tasks.len());
        Ok(PreparedMigration {
            tasks: outcome.tasks,
            mappings: outcome.mappings,
            pool_size,
        })
    }

    /// [`prepare`](Self::prepare), abandoned with `None` if `shutdown` resolves first.
    pub async fn prepare_until<F>(&self, shutdown: F) -> Result<Option<PreparedMigration>, OrchestratorError>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::select! {
            prepared = self.prepare() => prepared.map(Some),
            _ = shutdown => {
                warn!("Shutdown requested before any task started");
                Ok(None)
            }
        }
    }

    /// Tally of a run stopped before any task was launched: the ledger's size, nothing done.
    pub fn stopped_before_start(&self) -> MigrationTally {
        let total = JsonTaskLedger::new(self.config.tasks_file())
            .load()
            .map(|tasks| tasks.len())
            .unwrap_or_default();
        MigrationTally::new(total)
    }

    /// Run prepared tasks until done or until `shutdown` resolves.
    pub async fn run<F>(&self, prepared: PreparedMigration, shutdown: F) -> Result<MigrationTally, OrchestratorError>
    where
        F: Future<Output = ()> + Send,
    {
        let mut runner = MigrationRunner::new(
            RunnerConfig::from_migration(&self.config),
            Arc::clone(&self.launcher),
            CancelFlag::from_config(&self.config),
        );
        if let Some(callback) = &self.on_progress {
            runner = runner.with_progress(Arc::clone(callback));
        }
        runner.run(prepared.tasks, shutdown).await
    }

    /// Discover, provision and transfer.
    pub async fn migrate<F>(&self, shutdown: F) -> Result<MigrationTally, OrchestratorError>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        match self.prepare_until(&mut shutdown).await? {
            Some(prepared) => self.run(prepared, shutdown).await,
            None => Ok(self.stopped_before_start()),
        }
    }
}
