use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use esmigrate_core::config::{ACCESS_KEY_ENV, ACCESS_KEY_ID_ENV};
use esmigrate_core::{ConfigOverrides, Credentials};

#[derive(Parser, Debug)]
#[command(name = "es-migrate")]
#[command(about = "Migrate Elasticsearch indexes into log service logstores, shard by shard")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run (or resume) a migration
    Migrate(MigrateArgs),

    /// Transfer a single task; spawned by `migrate`
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Log service access key id
    #[arg(long, env = ACCESS_KEY_ID_ENV, hide_env_values = true)]
    pub access_key_id: Option<String>,

    /// Log service access key secret
    #[arg(long, env = ACCESS_KEY_ENV, hide_env_values = true)]
    pub access_key: Option<String>,
}

impl CredentialArgs {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.access_key_id.clone().unwrap_or_default(),
            self.access_key.clone().unwrap_or_default(),
        )
    }

    pub fn is_complete(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.access_key_id) && present(&self.access_key)
    }
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Directory holding the configuration cache, task ledger and cursors
    #[arg(long)]
    pub cache_path: PathBuf,

    /// Comma-separated source cluster hosts
    #[arg(long)]
    pub hosts: Option<String>,

    /// Log service endpoint
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Destination project
    #[arg(long)]
    pub project_name: Option<String>,

    /// Comma-separated index patterns to migrate
    #[arg(long)]
    pub indexes: Option<String>,

    /// Search query (JSON object) applied to every shard scan
    #[arg(long)]
    pub query: Option<String>,

    /// Document field holding the log time
    #[arg(long)]
    pub time_reference: Option<String>,

    /// JSON object of logstore name to comma-separated index patterns
    #[arg(long)]
    pub logstore_index_mappings: Option<String>,

    /// Source attribute of written log groups
    #[arg(long)]
    pub source: Option<String>,

    /// Topic of written log groups
    #[arg(long)]
    pub topic: Option<String>,

    /// Number of concurrent worker processes
    #[arg(long)]
    pub pool_size: Option<usize>,

    /// Documents per scan page and log group
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seconds to wait after creating logstores
    #[arg(long)]
    pub wait_time_in_secs: Option<u64>,

    /// Create missing logstores and indexes
    #[arg(long)]
    pub auto_creation: Option<bool>,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

impl MigrateArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            endpoint: self.endpoint.clone(),
            project_name: self.project_name.clone(),
            hosts: self.hosts.clone(),
            indexes: self.indexes.clone(),
            query: self.query.clone(),
            time_reference: self.time_reference.clone(),
            logstore_index_mappings: self.logstore_index_mappings.clone(),
            source: self.source.clone(),
            topic: self.topic.clone(),
            pool_size: self.pool_size,
            batch_size: self.batch_size,
            wait_time_in_secs: self.wait_time_in_secs,
            auto_creation: self.auto_creation,
        }
    }
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Cache directory prepared by `migrate`
    #[arg(long)]
    pub cache_path: PathBuf,

    /// Task record as JSON
    #[arg(long)]
    pub task: String,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}
