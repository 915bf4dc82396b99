use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arena::daemon::Scheduler;
use arena::server::{self, AppState};
use arena_ledger::PortfolioLedger;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "arena", about = "Trading Arena - AI agents competing with paper portfolios")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/arena.toml")]
    config: String,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create missing portfolios with the configured starting cash
    Init,
    /// Run one cycle and print the report
    Run {
        /// Ignore market hours and the daily quota
        #[arg(long)]
        force: bool,
    },
    /// Serve the HTTP trigger endpoint
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run cycles on a fixed interval until Ctrl-C
    Schedule {
        #[arg(long)]
        interval_seconds: Option<u64>,
        #[arg(long)]
        force: bool,
    },
    /// Print the leaderboard and today's trades
    Status,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}

/// Cancel the token on Ctrl-C.
fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received shutdown signal");
        cancel.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = arena::load_config(&cli.config)?;

    match cli.command {
        Command::Init => {
            let ledger = PortfolioLedger::new(arena::open_store(&config)?);
            let opened = arena::init_accounts(&ledger, &config)
                .context("Failed to initialize accounts")?;
            println!("Opened {opened} new portfolio(s) for {} agent(s)", config.agents.len());
        }
        Command::Run { force } => {
            let orchestrator =
                arena::build_orchestrator(&config).context("Failed to build orchestrator")?;
            let report = orchestrator.run_cycle(force).await;
            print_json(&report, cli.pretty)?;
        }
        Command::Serve { bind } => {
            let orchestrator =
                arena::build_orchestrator(&config).context("Failed to build orchestrator")?;
            let secret = std::env::var(&config.trigger.secret_env).ok();
            if secret.as_deref().map_or(true, str::is_empty) {
                tracing::warn!(
                    env = %config.trigger.secret_env,
                    "Trigger secret not set, every request will be rejected"
                );
            }
            let state = AppState::new(Arc::new(orchestrator), secret);
            let bind = bind.unwrap_or_else(|| config.trigger.bind.clone());

            let cancel = CancellationToken::new();
            shutdown_on_ctrl_c(cancel.clone());
            server::serve(state, &bind, cancel)
                .await
                .with_context(|| format!("Trigger server failed on {bind}"))?;
        }
        Command::Schedule {
            interval_seconds,
            force,
        } => {
            let orchestrator =
                arena::build_orchestrator(&config).context("Failed to build orchestrator")?;
            let interval = Duration::from_secs(
                interval_seconds.unwrap_or(config.trigger.schedule_interval_seconds),
            );
            let scheduler = Scheduler::new(Arc::new(orchestrator), interval, force);
            shutdown_on_ctrl_c(scheduler.cancel_token());
            scheduler.run().await;
        }
        Command::Status => {
            let ledger = PortfolioLedger::new(arena::open_store(&config)?);
            let standings = arena::standings(&ledger, chrono::Utc::now())
                .context("Failed to read ledger")?;
            print_json(&standings, cli.pretty)?;
        }
    }

    Ok(())
}
