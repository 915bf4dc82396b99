pub mod agent;
pub mod config;
pub mod cycle;
pub mod portfolio;
pub mod quote;
pub mod storage_schema;
pub mod trade;

pub use agent::AgentProfile;
pub use config::{
    ArenaConfig, ConfigError, CycleConfig, MarketDataConfig, ProviderConfig, StorageConfig,
    SymbolAssignment, TriggerConfig,
};
pub use cycle::{AgentCycleResult, CycleReport, CycleStatus};
pub use portfolio::{Portfolio, TradeOutcome};
pub use quote::Quote;
pub use trade::{Decision, TradeAction, TradeEvent, TradeResult, TradeStatus};
