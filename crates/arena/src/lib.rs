//! Trading Arena - autonomous agents competing with paper-trading portfolios.
//!
//! Each cycle, every agent gets a quote, asks its decision source what to do,
//! and the result is applied to a shared SQLite ledger under a daily quota.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! # async fn demo() -> anyhow::Result<()> {
//! let config = arena::load_config("config/arena.toml")?;
//! let orchestrator = arena::build_orchestrator(&config)?;
//! let report = orchestrator.run_cycle(false).await;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```

pub use arena_agents as agents;
pub use arena_ledger as ledger;
pub use arena_market as market;
pub use arena_models as models;

pub mod daemon;
pub mod server;
pub mod trigger;

pub use trigger::{trigger, TriggerError, TriggerRequest};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use arena_agents::{ChatCompletionsSource, CycleOrchestrator};
use arena_ledger::{LedgerError, LedgerStore, PortfolioLedger, SqliteStore, TradeExecutor};
use arena_market::{AlwaysOpen, MarketDataGateway, MarketHoursGate, UsEquityHours};
use arena_models::config::ArenaConfig;
use arena_models::portfolio::Portfolio;
use arena_models::trade::TradeEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Read, parse and validate a TOML config file.
pub fn load_config(path: &str) -> anyhow::Result<ArenaConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {path}"))?;
    let config: ArenaConfig = toml::from_str(&raw).context("Failed to parse config")?;
    config.validate().context("Invalid config")?;
    Ok(config)
}

pub fn open_store(config: &ArenaConfig) -> anyhow::Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.storage.sqlite_path)
        .with_context(|| format!("Failed to open ledger DB: {}", config.storage.sqlite_path))?;
    Ok(Arc::new(store))
}

/// Open a portfolio with the configured starting cash for every agent that
/// lacks one. Returns how many were created.
pub fn init_accounts(ledger: &PortfolioLedger, config: &ArenaConfig) -> Result<usize, LedgerError> {
    let mut opened = 0;
    for agent in &config.agents {
        if ledger.open_account(&agent.name, config.storage.starting_cash)? {
            opened += 1;
        }
    }
    info!(opened, agents = config.agents.len(), "Accounts initialized");
    Ok(opened)
}

/// Build a CycleOrchestrator over the given store from configuration.
pub fn build_orchestrator_with_store(
    config: &ArenaConfig,
    store: Arc<dyn LedgerStore>,
) -> anyhow::Result<CycleOrchestrator> {
    let executor = Arc::new(TradeExecutor::from_store(
        store,
        config.cycle.max_daily_trades,
    ));
    init_accounts(executor.ledger(), config).context("Failed to initialize accounts")?;

    let quotes = MarketDataGateway::new(config.market_data.clone())
        .context("Failed to build market data client")?;
    let decisions = ChatCompletionsSource::new(
        config.providers.clone(),
        Duration::from_secs(config.cycle.decision_timeout_seconds),
    )
    .context("Failed to build decision client")?;
    let gate: Arc<dyn MarketHoursGate> = if config.cycle.enforce_market_hours {
        Arc::new(UsEquityHours)
    } else {
        Arc::new(AlwaysOpen)
    };

    Ok(CycleOrchestrator::new(
        config.agents.clone(),
        config.cycle.clone(),
        Arc::new(decisions),
        Arc::new(quotes),
        gate,
        executor,
    ))
}

/// Build a CycleOrchestrator from configuration, opening the configured SQLite file.
pub fn build_orchestrator(config: &ArenaConfig) -> anyhow::Result<CycleOrchestrator> {
    let store = open_store(config)?;
    build_orchestrator_with_store(config, store)
}

/// One leaderboard row.
#[derive(Debug, Clone, Serialize)]
pub struct Standing {
    pub portfolio: Portfolio,
    pub trades_today: Vec<TradeEvent>,
}

/// Portfolios ranked by total value, each with its trades since midnight UTC.
pub fn standings(
    ledger: &PortfolioLedger,
    now: DateTime<Utc>,
) -> Result<Vec<Standing>, LedgerError> {
    let since = arena_ledger::quota::start_of_utc_day(now);
    let mut rows = ledger
        .portfolios()?
        .into_iter()
        .map(|portfolio| {
            let trades_today = ledger.store().events_since(&portfolio.agent_name, since)?;
            Ok(Standing {
                portfolio,
                trades_today,
            })
        })
        .collect::<Result<Vec<_>, LedgerError>>()?;
    rows.sort_by(|a, b| b.portfolio.total_value.cmp(&a.portfolio.total_value));
    Ok(rows)
}
