use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trade::{TradeAction, TradeStatus};

/// Final state of one agent's pipeline within a cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Success,
    InsufficientFunds,
    InsufficientPosition,
    NoAction,
    MarketClosed,
    LimitReached,
    /// Another cycle in this process is still working on the same agent.
    AlreadyRunning,
    TimedOut,
    Error,
}

impl From<TradeStatus> for CycleStatus {
    fn from(status: TradeStatus) -> Self {
        match status {
            TradeStatus::Success => CycleStatus::Success,
            TradeStatus::InsufficientFunds => CycleStatus::InsufficientFunds,
            TradeStatus::InsufficientPosition => CycleStatus::InsufficientPosition,
            TradeStatus::NoAction => CycleStatus::NoAction,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCycleResult {
    pub agent_name: String,
    pub provider: String,
    pub symbol: Option<String>,
    pub status: CycleStatus,
    pub action: Option<TradeAction>,
    pub price: Option<Decimal>,
    pub quantity: Option<u64>,
    pub reason: String,
    pub simulated_price: bool,
    pub elapsed_ms: u64,
}

impl AgentCycleResult {
    /// A pipeline that stopped before fetching a quote.
    pub fn skipped(agent_name: &str, provider: &str, status: CycleStatus, reason: String) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            provider: provider.to_string(),
            symbol: None,
            status,
            action: None,
            price: None,
            quantity: None,
            reason,
            simulated_price: false,
            elapsed_ms: 0,
        }
    }

    pub fn failed(agent_name: &str, provider: &str, symbol: Option<&str>, reason: String) -> Self {
        Self {
            symbol: symbol.map(str::to_string),
            ..Self::skipped(agent_name, provider, CycleStatus::Error, reason)
        }
    }
}

/// Everything one cycle produced, one entry per attempted agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub forced: bool,
    pub results: Vec<AgentCycleResult>,
    pub elapsed_ms: u64,
}

impl CycleReport {
    pub fn result_for(&self, agent_name: &str) -> Option<&AgentCycleResult> {
        self.results.iter().find(|r| r.agent_name == agent_name)
    }

    pub fn count(&self, status: CycleStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serialization() {
        assert_eq!(
            serde_json::to_string(&CycleStatus::LimitReached).unwrap(),
            "\"limit_reached\""
        );
        assert_eq!(
            CycleStatus::from(TradeStatus::InsufficientFunds),
            CycleStatus::InsufficientFunds
        );
    }

    #[test]
    fn failed_result_keeps_symbol() {
        let r = AgentCycleResult::failed("a", "silicon", Some("NVDA"), "boom".to_string());
        assert_eq!(r.status, CycleStatus::Error);
        assert_eq!(r.symbol.as_deref(), Some("NVDA"));
        assert!(r.action.is_none());
    }

    #[test]
    fn report_lookup_and_count() {
        let report = CycleReport {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            forced: false,
            results: vec![
                AgentCycleResult::skipped("a", "p", CycleStatus::MarketClosed, "closed".into()),
                AgentCycleResult::skipped("b", "p", CycleStatus::MarketClosed, "closed".into()),
                AgentCycleResult::failed("c", "p", None, "x".into()),
            ],
            elapsed_ms: 3,
        };
        assert_eq!(report.count(CycleStatus::MarketClosed), 2);
        assert_eq!(report.result_for("c").unwrap().status, CycleStatus::Error);
        assert!(report.result_for("zzz").is_none());
    }
}
