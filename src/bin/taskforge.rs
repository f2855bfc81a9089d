//! Runs the task orchestration engine as a standalone process.
//!
//! Usage:
//!
//! ```text
//! taskforge [--config <path>]
//! ```
//!
//! Without a config file every setting takes its default. When
//! `database.url` is set tasks are stored in `PostgreSQL`; otherwise they
//! live in memory for the lifetime of the process.
//!
//! The executor wired here only logs each run request. A dispatched task
//! stays `processing` until an external runtime reports the run back
//! through the orchestration service, or until the execution timeout fails
//! it with `{"error": "timed out"}`. When `execution.timeout_secs` is unset
//! the binary applies a 300-second timeout.

use clap::Parser;
use mockable::DefaultClock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use taskforge::config::TaskforgeConfig;
use taskforge::task::adapters::memory::{
    BroadcastEventBus, ChannelExecutor, InMemoryTaskRepository,
};
use taskforge::task::adapters::postgres::PostgresTaskRepository;
use taskforge::task::domain::TaskEvent;
use taskforge::task::ports::{ExecutionRequest, TaskRepository};
use taskforge::task::services::{SchedulerTicker, TaskOrchestrationService};
use taskforge::telemetry;
use tokio::sync::{broadcast, mpsc};

/// Boxed error type for the main result.
type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Execution timeout used when the configuration does not set one.
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Parser)]
#[command(
    name = "taskforge",
    version,
    about = "Task orchestration engine",
    long_about = "Task orchestration engine.\n\n\
        Dispatched runs are only logged; no executor is attached. A run stays \
        processing until it is reported back or the execution timeout fails it \
        with {\"error\": \"timed out\"}. The timeout is execution.timeout_secs, \
        or 300 seconds when unset."
)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    let config = match cli.config.as_deref() {
        Some(path) => TaskforgeConfig::load_path(path)?,
        None => TaskforgeConfig::default(),
    };
    telemetry::init(&config.logging)?;

    if let Some(url) = config.database.url.as_deref() {
        let repository = PostgresTaskRepository::connect(url)?;
        tracing::info!("using postgres task storage");
        serve(Arc::new(repository), &config).await
    } else {
        tracing::info!("using in-memory task storage");
        serve(Arc::new(InMemoryTaskRepository::new()), &config).await
    }
}

async fn serve<R>(repository: Arc<R>, config: &TaskforgeConfig) -> Result<(), BoxError>
where
    R: TaskRepository + 'static,
{
    let events = Arc::new(BroadcastEventBus::new(config.events.channel_capacity));
    let (executor, runs) = ChannelExecutor::new();
    let service = TaskOrchestrationService::new(
        repository,
        Arc::clone(&events),
        Arc::new(executor),
        Arc::new(DefaultClock),
        config
            .orchestration_settings()
            .with_default_execution_timeout(DEFAULT_RUN_TIMEOUT),
    );

    let event_log = tokio::spawn(log_events(events.subscribe()));
    let run_log = tokio::spawn(log_runs(runs));

    service.start().await?;
    let ticker = SchedulerTicker::new(service.clone(), config.tick_interval()).spawn();

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    ticker.stop().await;
    service.shutdown();
    event_log.abort();
    run_log.abort();
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<TaskEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => tracing::info!(
                topic = %event.topic(),
                task_id = %event.task_id(),
                payload = %event.payload(),
                "task event"
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn log_runs(mut runs: mpsc::UnboundedReceiver<ExecutionRequest>) {
    while let Some(request) = runs.recv().await {
        tracing::info!(
            task_id = %request.task_id,
            state = %request.state,
            attachments = request.attachments.len(),
            "run awaiting external executor"
        );
    }
}
