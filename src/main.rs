use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use loyalty_jobs::background_jobs::jobs::loyalty_job_registry;
use loyalty_jobs::background_jobs::{JobContext, JobOrchestrator, StartupPolicy};
use loyalty_jobs::config::{AppConfig, CliConfig, FileConfig};
use loyalty_jobs::messaging::{LogMessageSender, MessageOutbox};
use loyalty_jobs::server::{self, run_server};
use loyalty_jobs::MemoryLoyaltyStore;

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML configuration file. Values in the file override CLI flags.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// The port for the admin server (job status and Prometheus scraping).
    #[clap(long, default_value_t = 9092)]
    pub admin_port: u16,

    /// How a failing job starter affects the rest of startup.
    #[clap(long, value_enum)]
    pub startup_policy: Option<StartupPolicy>,

    /// Do not start the admin server.
    #[clap(long)]
    pub no_admin_server: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        admin_port: cli_args.admin_port,
        admin_server: !cli_args.no_admin_server,
        startup_policy: cli_args.startup_policy,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    let loyalty_store = Arc::new(MemoryLoyaltyStore::new());
    let (outbox, message_receiver) =
        MessageOutbox::channel(config.background_jobs.message_queue_capacity);

    let registry = loyalty_job_registry(
        &config.background_jobs,
        message_receiver,
        Arc::new(LogMessageSender),
    )
    .context("Failed to build job registry")?;

    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(
        shutdown_token.child_token(),
        tokio::runtime::Handle::current(),
        loyalty_store,
        outbox,
    );
    let orchestrator = Arc::new(JobOrchestrator::new(
        registry,
        job_context,
        config.background_jobs.startup_policy,
    ));

    // Under the isolated policy a partial bring-up is reported, not fatal.
    orchestrator
        .start_jobs()
        .context("Background job startup failed")?;

    let admin_server = if config.admin_server {
        let orchestrator = Arc::clone(&orchestrator);
        let token = shutdown_token.clone();
        let port = config.admin_port;
        Some(tokio::spawn(async move {
            if let Err(e) = run_server(orchestrator, port, token).await {
                error!("Admin server error: {}", e);
            }
        }))
    } else {
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping background jobs...");

    orchestrator
        .shutdown(Duration::from_secs(config.background_jobs.shutdown_timeout_secs))
        .await;
    shutdown_token.cancel();

    if let Some(handle) = admin_server {
        if let Err(e) = handle.await {
            error!("Admin server task failed: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}
