//! Scripted collaborators for driving the orchestrator without network access.
//!
//! Each mock records how often it was called so tests can assert that gated
//! agents never reached the quote or decision stage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use arena_market::{MarketHoursGate, MarketStatus, QuoteSource};
use arena_models::agent::AgentProfile;
use arena_models::quote::Quote;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::decision_source::DecisionSource;
use crate::error::AgentError;

/// What a scripted agent does when asked for a decision.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(serde_json::Value),
    Fail(String),
    MissingCredentials,
    /// Reply after a delay, for exercising timeouts.
    Slow(Duration, serde_json::Value),
    Panic,
}

/// Decision source answering from a per-agent script. Unscripted agents HOLD.
#[derive(Default)]
pub struct ScriptedDecisions {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, agent: &str, script: Script) -> Self {
        self.scripts.insert(agent.to_string(), script);
        self
    }

    pub fn reply(self, agent: &str, payload: serde_json::Value) -> Self {
        self.with(agent, Script::Reply(payload))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Market summaries each agent was shown, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecisions {
    async fn decide(
        &self,
        agent: &AgentProfile,
        market_summary: &str,
    ) -> Result<serde_json::Value, AgentError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((agent.name.clone(), market_summary.to_string()));
        }
        match self.scripts.get(&agent.name) {
            None => Ok(serde_json::json!({"action": "HOLD", "reason": "unscripted"})),
            Some(Script::Reply(payload)) => Ok(payload.clone()),
            Some(Script::Fail(message)) => Err(AgentError::Parse(message.clone())),
            Some(Script::MissingCredentials) => Err(AgentError::Config(format!(
                "API key missing ({})",
                agent.api_key_env
            ))),
            Some(Script::Slow(delay, payload)) => {
                tokio::time::sleep(*delay).await;
                Ok(payload.clone())
            }
            Some(Script::Panic) => panic!("scripted panic for {}", agent.name),
        }
    }
}

/// Quote source with fixed prices per symbol.
pub struct FixedQuotes {
    prices: HashMap<String, Decimal>,
    default_price: Decimal,
    simulated: bool,
    calls: AtomicUsize,
}

impl FixedQuotes {
    pub fn new(default_price: Decimal) -> Self {
        Self {
            prices: HashMap::new(),
            default_price,
            simulated: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn price(mut self, symbol: &str, price: Decimal) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    pub fn simulated(mut self) -> Self {
        self.simulated = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for FixedQuotes {
    async fn quote(&self, symbol: &str) -> Quote {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let price = self.prices.get(symbol).copied().unwrap_or(self.default_price);
        Quote {
            symbol: symbol.to_string(),
            price,
            summary: format!("Symbol: {symbol}, Price: {price}"),
            simulated: self.simulated,
            as_of: Utc::now(),
        }
    }
}

/// Gate stuck in one state.
pub struct FixedGate(pub MarketStatus);

impl FixedGate {
    pub fn open() -> Self {
        Self(MarketStatus::open())
    }

    pub fn closed(reason: &str) -> Self {
        Self(MarketStatus::closed(reason))
    }
}

impl MarketHoursGate for FixedGate {
    fn check(&self, _now: DateTime<Utc>) -> MarketStatus {
        self.0.clone()
    }
}

/// A minimal roster entry for tests.
pub fn agent(name: &str) -> AgentProfile {
    AgentProfile {
        name: name.to_string(),
        provider: "silicon".to_string(),
        model: Some("test-model".to_string()),
        model_env: None,
        api_key_env: format!("{}_KEY", name.to_uppercase().replace('-', "_")),
        role: "Tester".to_string(),
        style: "Deterministic".to_string(),
        risk: 50,
    }
}
