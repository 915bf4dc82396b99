use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::trade::{TradeAction, TradeStatus};

/// One agent's paper-trading account.
///
/// Share counts are unsigned, so a negative holding is unrepresentable.
/// `cash` is kept non-negative by `apply_trade`, which refuses any BUY
/// it cannot pay for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    pub agent_name: String,
    pub cash: Decimal,
    pub holdings: BTreeMap<String, u64>,
    /// Last price this agent traded each symbol at. Used to value holdings.
    pub marks: BTreeMap<String, Decimal>,
    pub total_value: Decimal,
    pub last_updated: DateTime<Utc>,
    /// Bumped by the store on every successful write.
    pub version: i64,
}

/// Result of applying one action to a portfolio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeOutcome {
    Success,
    InsufficientFunds { required: Decimal, available: Decimal },
    InsufficientPosition { held: u64, requested: u64 },
    NoAction,
}

impl TradeOutcome {
    pub fn status(&self) -> TradeStatus {
        match self {
            TradeOutcome::Success => TradeStatus::Success,
            TradeOutcome::InsufficientFunds { .. } => TradeStatus::InsufficientFunds,
            TradeOutcome::InsufficientPosition { .. } => TradeStatus::InsufficientPosition,
            TradeOutcome::NoAction => TradeStatus::NoAction,
        }
    }

    /// Human-readable failure reason, `None` unless the trade was refused.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            TradeOutcome::InsufficientFunds {
                required,
                available,
            } => Some(format!(
                "insufficient funds (required {required}, available {available})"
            )),
            TradeOutcome::InsufficientPosition { held, requested } => Some(format!(
                "insufficient position (held {held}, requested {requested})"
            )),
            _ => None,
        }
    }
}

impl Portfolio {
    pub fn new(agent_name: impl Into<String>, starting_cash: Decimal) -> Self {
        Self {
            agent_name: agent_name.into(),
            cash: starting_cash,
            holdings: BTreeMap::new(),
            marks: BTreeMap::new(),
            total_value: starting_cash,
            last_updated: Utc::now(),
            version: 0,
        }
    }

    pub fn shares(&self, symbol: &str) -> u64 {
        self.holdings.get(symbol).copied().unwrap_or(0)
    }

    /// Value of all holdings at their marks. A holding without a mark counts as zero.
    pub fn market_value(&self) -> Decimal {
        self.holdings
            .iter()
            .map(|(symbol, qty)| {
                let mark = self.marks.get(symbol).copied().unwrap_or(Decimal::ZERO);
                mark * Decimal::from(*qty)
            })
            .sum()
    }

    pub fn revalue(&mut self) {
        self.total_value = self.cash + self.market_value();
    }

    /// Apply a trade in place.
    ///
    /// On `InsufficientFunds`, `InsufficientPosition` and `NoAction` the
    /// portfolio is left untouched. On `Success` cash, holdings, the symbol's
    /// mark, `total_value` and `last_updated` all change together.
    pub fn apply_trade(
        &mut self,
        action: TradeAction,
        symbol: &str,
        price: Decimal,
        quantity: u64,
        at: DateTime<Utc>,
    ) -> TradeOutcome {
        let notional = price * Decimal::from(quantity);
        let held = self.shares(symbol);

        match action {
            TradeAction::Buy => {
                if self.cash < notional {
                    return TradeOutcome::InsufficientFunds {
                        required: notional,
                        available: self.cash,
                    };
                }
                self.cash -= notional;
                self.holdings
                    .insert(symbol.to_string(), held.saturating_add(quantity));
            }
            TradeAction::Sell => {
                if held < quantity {
                    return TradeOutcome::InsufficientPosition {
                        held,
                        requested: quantity,
                    };
                }
                self.cash += notional;
                self.holdings
                    .insert(symbol.to_string(), held.saturating_sub(quantity));
            }
            TradeAction::Hold | TradeAction::Fail => return TradeOutcome::NoAction,
        }

        self.marks.insert(symbol.to_string(), price);
        self.revalue();
        self.last_updated = at;
        TradeOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(cash: Decimal) -> Portfolio {
        Portfolio::new("Qwen-Quant", cash)
    }

    #[test]
    fn buy_within_budget() {
        let mut p = account(dec!(1000));
        let outcome = p.apply_trade(TradeAction::Buy, "NVDA", dec!(150), 5, Utc::now());

        assert_eq!(outcome, TradeOutcome::Success);
        assert_eq!(p.cash, dec!(250));
        assert_eq!(p.shares("NVDA"), 5);
        assert_eq!(p.total_value, dec!(1000));
    }

    #[test]
    fn buy_over_budget_leaves_state_alone() {
        let mut p = account(dec!(1000));
        let before = p.clone();
        let outcome = p.apply_trade(TradeAction::Buy, "NVDA", dec!(150), 10, Utc::now());

        assert_eq!(
            outcome,
            TradeOutcome::InsufficientFunds {
                required: dec!(1500),
                available: dec!(1000)
            }
        );
        assert_eq!(p, before);
    }

    #[test]
    fn buy_exactly_all_cash() {
        let mut p = account(dec!(750));
        let outcome = p.apply_trade(TradeAction::Buy, "NVDA", dec!(150), 5, Utc::now());
        assert_eq!(outcome, TradeOutcome::Success);
        assert_eq!(p.cash, Decimal::ZERO);
    }

    #[test]
    fn sell_more_than_held_leaves_state_alone() {
        let mut p = account(dec!(1000));
        p.holdings.insert("NVDA".to_string(), 3);
        let before = p.clone();

        let outcome = p.apply_trade(TradeAction::Sell, "NVDA", dec!(150), 5, Utc::now());
        assert_eq!(
            outcome,
            TradeOutcome::InsufficientPosition {
                held: 3,
                requested: 5
            }
        );
        assert_eq!(p, before);
    }

    #[test]
    fn sell_unknown_symbol_is_insufficient_position() {
        let mut p = account(dec!(1000));
        let outcome = p.apply_trade(TradeAction::Sell, "TSLA", dec!(200), 1, Utc::now());
        assert!(matches!(
            outcome,
            TradeOutcome::InsufficientPosition { held: 0, .. }
        ));
    }

    #[test]
    fn sell_credits_cash_and_reprices() {
        let mut p = account(dec!(250));
        p.holdings.insert("NVDA".to_string(), 5);
        p.marks.insert("NVDA".to_string(), dec!(150));

        let outcome = p.apply_trade(TradeAction::Sell, "NVDA", dec!(160), 2, Utc::now());
        assert_eq!(outcome, TradeOutcome::Success);
        assert_eq!(p.cash, dec!(570));
        assert_eq!(p.shares("NVDA"), 3);
        assert_eq!(p.total_value, dec!(1050));
    }

    #[test]
    fn hold_and_fail_are_no_ops() {
        let mut p = account(dec!(1000));
        let before = p.clone();
        for action in [TradeAction::Hold, TradeAction::Fail] {
            let outcome = p.apply_trade(action, "NVDA", dec!(150), 5, Utc::now());
            assert_eq!(outcome, TradeOutcome::NoAction);
        }
        assert_eq!(p, before);
    }

    #[test]
    fn total_value_covers_every_marked_holding() {
        let mut p = account(dec!(10000));
        p.apply_trade(TradeAction::Buy, "NVDA", dec!(100), 10, Utc::now());
        p.apply_trade(TradeAction::Buy, "AAPL", dec!(200), 5, Utc::now());
        p.apply_trade(TradeAction::Buy, "NVDA", dec!(110), 1, Utc::now());

        // cash = 10000 - 1000 - 1000 - 110 = 7890
        // NVDA 11 @ 110 = 1210, AAPL 5 @ 200 = 1000
        assert_eq!(p.cash, dec!(7890));
        assert_eq!(p.total_value, dec!(10100));
    }

    #[test]
    fn cash_never_goes_negative_over_a_sequence() {
        let mut p = account(dec!(500));
        let steps = [
            (TradeAction::Buy, 3u64, dec!(120)),
            (TradeAction::Buy, 2, dec!(130)),
            (TradeAction::Sell, 4, dec!(90)),
            (TradeAction::Sell, 1, dec!(95)),
            (TradeAction::Buy, 9, dec!(100)),
            (TradeAction::Sell, 1, dec!(80)),
        ];
        for (action, qty, price) in steps {
            p.apply_trade(action, "AMD", price, qty, Utc::now());
            assert!(p.cash >= Decimal::ZERO, "cash went negative: {}", p.cash);
        }
    }

    #[test]
    fn failure_reason_text() {
        let o = TradeOutcome::InsufficientFunds {
            required: dec!(1500),
            available: dec!(1000),
        };
        assert_eq!(o.status(), TradeStatus::InsufficientFunds);
        assert!(o.failure_reason().unwrap().contains("insufficient funds"));
        assert!(TradeOutcome::Success.failure_reason().is_none());
    }
}
