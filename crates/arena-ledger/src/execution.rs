use std::sync::Arc;

use arena_models::portfolio::TradeOutcome;
use arena_models::quote::Quote;
use arena_models::trade::{Decision, TradeAction, TradeEvent, TradeResult, TradeStatus};
use tracing::{info, warn};

use crate::error::LedgerError;
use crate::ledger::PortfolioLedger;
use crate::quota::QuotaTracker;
use crate::store::LedgerStore;

/// The trade execution unit: quota gate, ledger application and audit trail.
///
/// HOLD decisions touch nothing. Every BUY/SELL that reaches the ledger leaves
/// exactly one trade event, either with its own action or as FAIL.
pub struct TradeExecutor {
    ledger: PortfolioLedger,
    quota: QuotaTracker,
}

impl TradeExecutor {
    pub fn new(ledger: PortfolioLedger, quota: QuotaTracker) -> Self {
        Self { ledger, quota }
    }

    pub fn from_store(store: Arc<dyn LedgerStore>, max_daily_trades: u32) -> Self {
        Self::new(
            PortfolioLedger::new(store.clone()),
            QuotaTracker::new(store, max_daily_trades),
        )
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn limit_reached(&self, agent_name: &str) -> bool {
        self.quota.is_limit_reached(agent_name)
    }

    /// Execute an untrusted decision payload at the quote's price.
    pub fn execute(
        &self,
        agent_name: &str,
        payload: &serde_json::Value,
        quote: &Quote,
    ) -> Result<TradeResult, LedgerError> {
        self.execute_decision(agent_name, &Decision::from_payload(payload), quote)
    }

    pub fn execute_decision(
        &self,
        agent_name: &str,
        decision: &Decision,
        quote: &Quote,
    ) -> Result<TradeResult, LedgerError> {
        if decision.action == TradeAction::Hold {
            return Ok(TradeResult {
                action: TradeAction::Hold,
                status: TradeStatus::NoAction,
                quantity: decision.quantity,
                reason: decision.rationale.clone(),
            });
        }

        // On success the event commits in the same write as the portfolio.
        let event = TradeEvent::new(
            agent_name,
            &quote.symbol,
            decision.action,
            quote.price,
            decision.quantity,
            decision.rationale.clone(),
            quote.simulated,
        );
        let outcome = self.ledger.apply_trade_recorded(&event)?;

        let (recorded_action, reason) = match outcome.failure_reason() {
            Some(failure) => {
                warn!(
                    agent = %agent_name,
                    action = %decision.action,
                    symbol = %quote.symbol,
                    %failure,
                    "Trade refused"
                );
                let reason = format!("Fails: {failure} | {}", decision.rationale);
                let fail = TradeEvent {
                    action: TradeAction::Fail,
                    reason: reason.clone(),
                    ..event
                };
                self.ledger.store().insert_event(&fail)?;
                (TradeAction::Fail, reason)
            }
            None if outcome == TradeOutcome::NoAction => {
                return Ok(TradeResult {
                    action: decision.action,
                    status: TradeStatus::NoAction,
                    quantity: decision.quantity,
                    reason: decision.rationale.clone(),
                });
            }
            None => (decision.action, decision.rationale.clone()),
        };

        info!(
            agent = %agent_name,
            action = %recorded_action,
            symbol = %quote.symbol,
            price = %quote.price,
            quantity = decision.quantity,
            "Trade recorded"
        );

        Ok(TradeResult {
            action: recorded_action,
            status: outcome.status(),
            quantity: decision.quantity,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;
    use arena_models::portfolio::Portfolio;
    use chrono::{DateTime, Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn quote(price: Decimal) -> Quote {
        Quote {
            symbol: "NVDA".to_string(),
            price,
            summary: "Symbol: NVDA".to_string(),
            simulated: false,
            as_of: Utc::now(),
        }
    }

    fn executor(cash: Decimal) -> (TradeExecutor, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let executor = TradeExecutor::from_store(store.clone(), 5);
        executor.ledger().open_account("a", cash).unwrap();
        (executor, store)
    }

    fn events(store: &SqliteStore) -> Vec<TradeEvent> {
        store
            .events_since("a", Utc::now() - Duration::hours(1))
            .unwrap()
    }

    #[test]
    fn successful_buy_is_logged_with_original_action() {
        let (executor, store) = executor(dec!(1000));
        let payload = json!({"action": "BUY", "quantity": 5, "reason": "dip"});
        let result = executor.execute("a", &payload, &quote(dec!(150))).unwrap();

        assert_eq!(result.status, TradeStatus::Success);
        assert_eq!(result.action, TradeAction::Buy);
        let logged = events(&store);
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].action, TradeAction::Buy);
        assert_eq!(logged[0].quantity, 5);
        assert_eq!(logged[0].reason, "dip");
    }

    #[test]
    fn refused_buy_is_logged_as_fail() {
        let (executor, store) = executor(dec!(1000));
        let payload = json!({"action": "BUY", "quantity": 10, "reason": "all in"});
        let result = executor.execute("a", &payload, &quote(dec!(150))).unwrap();

        assert_eq!(result.status, TradeStatus::InsufficientFunds);
        assert_eq!(result.action, TradeAction::Fail);
        assert!(result.reason.starts_with("Fails: insufficient funds"));
        assert!(result.reason.ends_with("| all in"));

        let logged = events(&store);
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].action, TradeAction::Fail);
        assert_eq!(executor.ledger().portfolio("a").unwrap().cash, dec!(1000));
    }

    #[test]
    fn hold_writes_nothing() {
        let (executor, store) = executor(dec!(1000));
        let before = executor.ledger().portfolio("a").unwrap();
        let result = executor
            .execute("a", &json!({"action": "HOLD", "reason": "wait"}), &quote(dec!(150)))
            .unwrap();

        assert_eq!(result.status, TradeStatus::NoAction);
        assert!(events(&store).is_empty());
        assert_eq!(executor.ledger().portfolio("a").unwrap(), before);
    }

    #[test]
    fn malformed_payload_becomes_hold() {
        let (executor, store) = executor(dec!(1000));
        let result = executor
            .execute("a", &json!(["not", "an", "object"]), &quote(dec!(150)))
            .unwrap();
        assert_eq!(result.action, TradeAction::Hold);
        assert!(events(&store).is_empty());
    }

    #[test]
    fn missing_portfolio_is_an_error() {
        let (executor, _store) = executor(dec!(1000));
        let err = executor
            .execute("ghost", &json!({"action": "SELL", "quantity": 1}), &quote(dec!(150)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn simulated_price_flag_is_recorded() {
        let (executor, store) = executor(dec!(1000));
        let mut q = quote(dec!(99));
        q.simulated = true;
        executor
            .execute("a", &json!({"action": "BUY", "quantity": 1}), &q)
            .unwrap();
        assert!(events(&store)[0].simulated);
    }

    /// SQLite store whose trade log refuses every write.
    struct UnloggedStore {
        inner: SqliteStore,
    }

    fn log_down() -> LedgerError {
        LedgerError::Unavailable("log down".to_string())
    }

    impl LedgerStore for UnloggedStore {
        fn get_portfolio(&self, agent_name: &str) -> Result<Option<Portfolio>, LedgerError> {
            self.inner.get_portfolio(agent_name)
        }
        fn update_portfolio(&self, portfolio: &Portfolio) -> Result<bool, LedgerError> {
            self.inner.update_portfolio(portfolio)
        }
        fn insert_event(&self, _: &TradeEvent) -> Result<(), LedgerError> {
            Err(log_down())
        }
        fn commit_trade(&self, _: &Portfolio, _: &TradeEvent) -> Result<bool, LedgerError> {
            Err(log_down())
        }
        fn count_events_since(
            &self,
            agent: &str,
            since: DateTime<Utc>,
        ) -> Result<u64, LedgerError> {
            self.inner.count_events_since(agent, since)
        }
        fn create_portfolio(&self, portfolio: &Portfolio) -> Result<bool, LedgerError> {
            self.inner.create_portfolio(portfolio)
        }
        fn list_portfolios(&self) -> Result<Vec<Portfolio>, LedgerError> {
            self.inner.list_portfolios()
        }
        fn events_since(
            &self,
            agent: &str,
            since: DateTime<Utc>,
        ) -> Result<Vec<TradeEvent>, LedgerError> {
            self.inner.events_since(agent, since)
        }
    }

    #[test]
    fn unloggable_trade_leaves_portfolio_untouched() {
        let store = Arc::new(UnloggedStore {
            inner: SqliteStore::open_in_memory().unwrap(),
        });
        let executor = TradeExecutor::from_store(store, 5);
        executor.ledger().open_account("a", dec!(1000)).unwrap();

        for _ in 0..6 {
            let err = executor
                .execute("a", &json!({"action": "BUY", "quantity": 1}), &quote(dec!(100)))
                .unwrap_err();
            assert!(matches!(err, LedgerError::Unavailable(_)));
        }

        let p = executor.ledger().portfolio("a").unwrap();
        assert_eq!(p.cash, dec!(1000));
        assert_eq!(p.shares("NVDA"), 0);
        assert_eq!(p.version, 0);
    }

    #[test]
    fn oversized_quantity_is_refused_and_logged() {
        let (executor, store) = executor(dec!(1000));
        executor.ledger().open_account("b", dec!(1000)).unwrap();
        let payload = json!({"action": "SELL", "quantity": u64::MAX, "reason": "dump"});

        let result = executor.execute("a", &payload, &quote(dec!(150))).unwrap();
        assert_eq!(result.status, TradeStatus::InsufficientPosition);
        assert_eq!(result.action, TradeAction::Fail);

        let logged = events(&store);
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].action, TradeAction::Fail);
        assert_eq!(logged[0].quantity, arena_models::trade::MAX_QUANTITY);

        let payload = json!({"action": "BUY", "quantity": u64::MAX});
        let result = executor.execute("b", &payload, &quote(dec!(150))).unwrap();
        assert_eq!(result.status, TradeStatus::InsufficientFunds);
        assert_eq!(executor.ledger().portfolio("b").unwrap().cash, dec!(1000));
    }
}
