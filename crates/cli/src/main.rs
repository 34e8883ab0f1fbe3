mod args;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use args::{Cli, Command, MigrateArgs, WorkerArgs};
use esmigrate_core::{
    load_cached, load_or_init, run_worker, validate_config, CancelFlag, CheckpointStatus,
    MigrationManager, MigrationTally, OrchestratorError, TaskRecord, WorkerReport,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Logs go to stderr; stdout carries the reporting lines.
fn init_tracing(json: bool) {
    let text = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let json = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(text)
        .with(json)
        .init();
}

/// Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Migrate(args) => migrate(args, cli.log_json).await,
        Command::Worker(args) => worker(args).await,
    }
}

async fn migrate(args: MigrateArgs, log_json: bool) -> Result<bool> {
    let config = load_or_init(&args.cache_path, args.overrides()).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.cache_path.display()
        )
    })?;
    validate_config(&config).context("Configuration validation failed")?;

    if !args.credentials.is_complete() {
        warn!("Log service credentials are not set; requests will be rejected");
    }

    let program = std::env::current_exe().context("Failed to locate the es-migrate binary")?;
    let worker_args = if log_json {
        vec!["--log-json".to_string()]
    } else {
        Vec::new()
    };

    let manager =
        MigrationManager::from_config(config, args.credentials.credentials(), program, worker_args)?
            .with_progress(Arc::new(|tally: &MigrationTally| {
                println!(">> state: {}", tally_json(tally));
            }));

    let migration_id = uuid::Uuid::new_v4().simple().to_string();
    println!("#migration: {}", migration_id);
    let span = tracing::info_span!("migration", id = %migration_id);

    let tally = drive(&manager).instrument(span).await?;

    println!("exit: {}", tally_json(&tally));
    info!(
        finished = tally.finished,
        dropped = tally.dropped,
        failed = tally.failed,
        interrupted = tally.interrupted,
        "Migration stopped"
    );
    Ok(tally.is_complete())
}

/// Prepare and run, with one shutdown signal covering both phases.
async fn drive(manager: &MigrationManager) -> Result<MigrationTally, OrchestratorError> {
    info!(
        hosts = %manager.config().hosts,
        project = %manager.config().project_name,
        "Starting migration"
    );
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let Some(prepared) = manager.prepare_until(&mut shutdown).await? else {
        return Ok(manager.stopped_before_start());
    };
    println!("#pool_size: {}", prepared.pool_size);
    println!("#tasks: {}", prepared.tasks.len());

    manager.run(prepared, shutdown).await
}

async fn worker(args: WorkerArgs) -> Result<bool> {
    ignore_termination_signals()?;
    let task: TaskRecord =
        serde_json::from_str(&args.task).context("Failed to parse task record")?;
    let config = load_cached(&args.cache_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.cache_path.display()
        )
    })?;
    let flag = CancelFlag::from_config(&config);
    let credentials = args.credentials.credentials();

    let (status, succeeded) = match run_worker(&config, &credentials, &task, &flag).await {
        Ok(status) => (status, true),
        Err(e) => {
            error!(
                task_id = task.id,
                index = %task.source_index,
                shard = task.source_shard,
                error = %e,
                "Task failed"
            );
            (CheckpointStatus::Failed, false)
        }
    };

    let report = WorkerReport {
        task_id: task.id,
        status,
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(succeeded)
}

fn tally_json(tally: &MigrationTally) -> String {
    serde_json::to_string(tally).unwrap_or_else(|_| format!("{:?}", tally))
}

/// Workers stop only through the cancellation flag.
fn ignore_termination_signals() -> Result<()> {
    #[cfg(unix)]
    for kind in [
        signal::unix::SignalKind::interrupt(),
        signal::unix::SignalKind::terminate(),
    ] {
        let mut stream =
            signal::unix::signal(kind).context("Failed to install worker signal handler")?;
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                info!("Signal ignored, waiting for the cancellation flag");
            }
        });
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown requested, stopping workers");
}
