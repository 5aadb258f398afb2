//! Fleet Bot
//!
//! A worker agent that claims jobs from a central coordinator, executes them
//! with registered handlers under a concurrency limit and reports results.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: HTTP communication with the coordinator (jobs, bots)
//! - Handlers: Operation registry and built-in handlers
//! - Services: Execution, concurrency limiting, durable outbox
//! - Scheduler: Claim, dispatch and report cycle
//!
//! Reports that cannot be delivered are buffered in a local JSONL outbox and
//! retried at the start of every tick, so results survive coordinator
//! outages and restarts.

mod bot;
mod config;
mod handlers;
mod identity;
mod repository;
mod scheduler;
mod service;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Bot;
use crate::config::Config;
use crate::handlers::JobRegistry;
use crate::repository::{HttpBotRepository, HttpJobRepository};
use crate::service::{ExecutionService, FileOutbox, OutboxService, RegistryExecutionService};
use fleet_client::CoordinatorClient;

#[derive(Parser)]
#[command(name = "fleet-bot")]
#[command(about = "Fleet worker agent", long_about = None)]
#[command(version)]
struct Cli {
    /// Run a single tick after registering, then exit
    #[arg(long)]
    once: bool,

    /// Directory for identity and outbox files
    #[arg(long, env = "STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Start under a fresh instance id (the bot key is kept)
    #[arg(long)]
    rotate_instance_id: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_bot=info,fleet_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("Starting Fleet Bot");

    let config = Arc::new(load_config(&cli)?);
    info!(
        "Loaded configuration: server_base={}, state_dir={}",
        config.server_base,
        config.state_dir.display()
    );

    let identity = if cli.rotate_instance_id {
        identity::rotate_instance_id(&config.state_dir)
    } else {
        identity::load_or_create(&config.state_dir)
    }
    .context("Failed to load bot identity")?;
    info!(
        "Bot identity: bot_key={}, instance_id={}",
        identity.bot_key, identity.instance_id
    );

    // Initialize coordinator client
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let client = CoordinatorClient::with_client(config.server_base.clone(), http);

    info!("Coordinator client initialized");

    // Populate the registry once, then share it read-only
    let registry = JobRegistry::with_builtin();
    if registry.is_empty() {
        anyhow::bail!("No job handlers registered");
    }
    info!("Registered {} operation(s):", registry.len());
    for op in registry.operations() {
        info!("  - {}", op);
    }
    let registry = Arc::new(registry);
    let executor: Arc<dyn ExecutionService> = Arc::new(RegistryExecutionService::new(registry));

    let outbox = FileOutbox::new(config.outbox_path());
    match outbox.len().await {
        Ok(0) => {}
        Ok(pending) => info!(
            "{} buffered report(s) waiting in {}",
            pending,
            outbox.path().display()
        ),
        Err(e) => warn!("Could not inspect outbox: {}", e),
    }
    let outbox: Arc<dyn OutboxService> = Arc::new(outbox);

    let bot = Bot::new(
        Arc::clone(&config),
        identity,
        Arc::new(HttpBotRepository::new(client.clone())),
        Arc::new(HttpJobRepository::new(client)),
        executor,
        outbox,
    );

    info!("Bot initialized successfully");

    if cli.once {
        let report = bot.run_once().await?;
        info!(
            "Single tick done: claimed={}, completed={}, failed={}, buffered={}",
            report.claimed, report.completed, report.failed, report.buffered
        );
        return Ok(());
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = bot.run(shutdown).await {
        error!("Bot error: {:#}", e);
        return Err(e);
    }

    Ok(())
}

/// Loads configuration from environment variables and command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::from_env().context("Invalid configuration in environment")?;

    if let Some(state_dir) = &cli.state_dir {
        config = config.with_state_dir(state_dir.clone());
    }

    config.validate()?;
    Ok(config)
}
