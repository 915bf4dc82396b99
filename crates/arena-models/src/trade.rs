use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Quantity used when a decision carries no usable quantity.
pub const DEFAULT_QUANTITY: u64 = 1;

/// Largest quantity a decision can carry. Larger requests are clamped, so an
/// absurd order is still refused by the ledger rather than shrunk to a
/// tradable default.
pub const MAX_QUANTITY: u64 = 1_000_000_000;

/// Rationale used when a decision carries no usable reason.
pub const PLACEHOLDER_RATIONALE: &str = "No reason provided";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
    /// Recorded in place of BUY/SELL when the ledger refused the trade.
    Fail,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
            TradeAction::Fail => "FAIL",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeAction::Buy),
            "SELL" => Ok(TradeAction::Sell),
            "HOLD" => Ok(TradeAction::Hold),
            "FAIL" => Ok(TradeAction::Fail),
            other => Err(format!("unknown trade action: {other}")),
        }
    }
}

/// A normalized trading decision.
///
/// The payload produced by a decision source is untrusted JSON. `from_payload`
/// is the only way such a payload becomes a `Decision`, and it never fails:
/// anything unusable collapses to a safe default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Decision {
    pub action: TradeAction,
    pub quantity: u64,
    pub rationale: String,
}

impl Decision {
    pub fn hold(rationale: impl Into<String>) -> Self {
        Self {
            action: TradeAction::Hold,
            quantity: DEFAULT_QUANTITY,
            rationale: rationale.into(),
        }
    }

    /// Normalize an untrusted `{action, quantity, reason}` payload.
    ///
    /// - `action`: BUY/SELL/HOLD (case-insensitive); anything else is HOLD.
    ///   FAIL is never accepted from outside.
    /// - `quantity`: number or numeric string, finite and >= 1, floored;
    ///   anything else is `DEFAULT_QUANTITY`.
    /// - `reason` (or `rationale`): non-blank string; otherwise a placeholder.
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        let action = payload
            .get("action")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<TradeAction>().ok())
            .filter(|a| *a != TradeAction::Fail)
            .unwrap_or(TradeAction::Hold);

        let quantity = payload
            .get("quantity")
            .and_then(parse_quantity)
            .unwrap_or(DEFAULT_QUANTITY);

        let rationale = payload
            .get("reason")
            .or_else(|| payload.get("rationale"))
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(PLACEHOLDER_RATIONALE)
            .to_string();

        Self {
            action,
            quantity,
            rationale,
        }
    }
}

fn parse_quantity(value: &serde_json::Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return (n >= 1).then_some(n.min(MAX_QUANTITY));
    }
    let raw = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() || raw < 1.0 {
        return None;
    }
    Some((raw.floor() as u64).min(MAX_QUANTITY))
}

/// An immutable audit record of an attempted or completed trade.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeEvent {
    pub id: Uuid,
    pub agent_name: String,
    pub symbol: String,
    pub action: TradeAction,
    pub price: Decimal,
    pub quantity: u64,
    pub reason: String,
    /// True when `price` came from the synthetic fallback.
    pub simulated: bool,
    pub created_at: DateTime<Utc>,
}

impl TradeEvent {
    pub fn new(
        agent_name: &str,
        symbol: &str,
        action: TradeAction,
        price: Decimal,
        quantity: u64,
        reason: String,
        simulated: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_name: agent_name.to_string(),
            symbol: symbol.to_string(),
            action,
            price,
            quantity,
            reason,
            simulated,
            created_at: Utc::now(),
        }
    }
}

/// Business status of one execution attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Success,
    InsufficientFunds,
    InsufficientPosition,
    NoAction,
}

/// What the execution unit reports back to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeResult {
    /// The action as recorded (FAIL when the ledger refused the trade).
    pub action: TradeAction,
    pub status: TradeStatus,
    pub quantity: u64,
    pub reason: String,
}
