use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::AgentProfile;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No agents configured")]
    NoAgents,

    #[error("Duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error("Agent {agent} uses unknown provider: {provider}")]
    UnknownProvider { agent: String, provider: String },

    #[error("Stock universe is empty")]
    EmptyUniverse,

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

/// Top-level configuration for the arena.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArenaConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    pub cycle: CycleConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default = "default_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,
    pub agents: Vec<AgentProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Path to the SQLite ledger database.
    pub sqlite_path: String,
    /// Cash each agent's portfolio is opened with.
    #[serde(default = "default_starting_cash")]
    pub starting_cash: Decimal,
}

/// Primary market data provider (Alpaca-style bars endpoint).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketDataConfig {
    #[serde(default = "default_market_base_url")]
    pub base_url: String,
    #[serde(default = "default_market_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_market_secret_env")]
    pub api_secret_env: String,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default = "default_bar_limit")]
    pub bar_limit: u32,
    /// Per-request timeout. Kept well below the cycle budget.
    #[serde(default = "default_market_timeout")]
    pub timeout_seconds: u64,
    /// How long a quote is reused for the same symbol.
    #[serde(default = "default_quote_ttl")]
    pub quote_ttl_seconds: u64,
    #[serde(default = "default_quote_capacity")]
    pub quote_cache_capacity: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_base_url(),
            api_key_env: default_market_key_env(),
            api_secret_env: default_market_secret_env(),
            timeframe: default_timeframe(),
            bar_limit: default_bar_limit(),
            timeout_seconds: default_market_timeout(),
            quote_ttl_seconds: default_quote_ttl(),
            quote_cache_capacity: default_quote_capacity(),
        }
    }
}

/// How symbols are handed out to agents within one cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SymbolAssignment {
    /// Every agent trades the same symbol.
    Shared { symbol: String },
    /// Each agent draws from a shuffled universe, wrapping around when
    /// agents outnumber symbols.
    #[default]
    PerAgent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleConfig {
    pub universe: Vec<String>,
    #[serde(default)]
    pub assignment: SymbolAssignment,
    /// Trade events per agent per UTC day before the quota gate closes.
    #[serde(default = "default_max_daily_trades")]
    pub max_daily_trades: u32,
    #[serde(default = "default_decision_timeout")]
    pub decision_timeout_seconds: u64,
    /// Wall-clock budget for one agent's whole pipeline.
    #[serde(default = "default_agent_timeout")]
    pub agent_timeout_seconds: u64,
    /// Skip agents outside regular US equity hours unless the cycle is forced.
    #[serde(default = "default_enforce_market_hours")]
    pub enforce_market_hours: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerConfig {
    /// Environment variable holding the shared trigger secret.
    #[serde(default = "default_secret_env")]
    pub secret_env: String,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_schedule_interval")]
    pub schedule_interval_seconds: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            secret_env: default_secret_env(),
            bind: default_bind(),
            schedule_interval_seconds: default_schedule_interval(),
        }
    }
}

/// An OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Request `response_format = json_object`.
    #[serde(default)]
    pub json_mode: bool,
}

impl ArenaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if !seen.insert(agent.name.as_str()) {
                return Err(ConfigError::DuplicateAgent(agent.name.clone()));
            }
            if !self.providers.contains_key(&agent.provider) {
                return Err(ConfigError::UnknownProvider {
                    agent: agent.name.clone(),
                    provider: agent.provider.clone(),
                });
            }
        }

        if self.cycle.universe.is_empty() {
            return Err(ConfigError::EmptyUniverse);
        }
        if self.cycle.universe.iter().any(|s| s.trim().is_empty()) {
            return Err(invalid("cycle.universe", "symbols must not be blank"));
        }
        if let SymbolAssignment::Shared { symbol } = &self.cycle.assignment {
            if symbol.trim().is_empty() {
                return Err(invalid("cycle.assignment.symbol", "must not be empty"));
            }
        }
        if self.cycle.max_daily_trades == 0 {
            return Err(invalid("cycle.max_daily_trades", "must be at least 1"));
        }
        if self.storage.starting_cash < Decimal::ZERO {
            return Err(invalid("storage.starting_cash", "must not be negative"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn default_starting_cash() -> Decimal {
    Decimal::new(100_000, 0)
}
fn default_market_base_url() -> String {
    "https://data.alpaca.markets".to_string()
}
fn default_market_key_env() -> String {
    "ALPACA_API_KEY".to_string()
}
fn default_market_secret_env() -> String {
    "ALPACA_API_SECRET".to_string()
}
fn default_timeframe() -> String {
    "15Min".to_string()
}
fn default_bar_limit() -> u32 {
    5
}
fn default_market_timeout() -> u64 {
    5
}
fn default_quote_ttl() -> u64 {
    30
}
fn default_quote_capacity() -> u64 {
    1_000
}
fn default_max_daily_trades() -> u32 {
    5
}
fn default_decision_timeout() -> u64 {
    20
}
fn default_agent_timeout() -> u64 {
    55
}
fn default_enforce_market_hours() -> bool {
    true
}

fn default_secret_env() -> String {
    "CRON_SECRET".to_string()
}
fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_schedule_interval() -> u64 {
    900
}

fn default_providers() -> BTreeMap<String, ProviderConfig> {
    BTreeMap::from([
        (
            "silicon".to_string(),
            ProviderConfig {
                base_url: "https://api.siliconflow.cn/v1".to_string(),
                json_mode: true,
            },
        ),
        (
            "volcano".to_string(),
            ProviderConfig {
                base_url: "https://ark.cn-beijing.volces.com/api/v3".to_string(),
                json_mode: false,
            },
        ),
    ])
}
