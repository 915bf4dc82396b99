use std::sync::Arc;

use arena_models::portfolio::{Portfolio, TradeOutcome};
use arena_models::trade::{TradeAction, TradeEvent};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::store::LedgerStore;

/// Read-modify-write attempts before giving up on a contended portfolio.
const MAX_UPDATE_ATTEMPTS: usize = 3;

/// The authoritative per-agent record of cash and holdings.
///
/// Every mutation goes through `apply_trade`, which writes with a version
/// check. Two pipelines racing on the same agent cannot both commit against
/// the same snapshot: the loser re-reads and re-validates.
pub struct PortfolioLedger {
    store: Arc<dyn LedgerStore>,
}

impl PortfolioLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Create the agent's portfolio if it does not exist yet.
    /// Returns `true` when a new account was opened.
    pub fn open_account(
        &self,
        agent_name: &str,
        starting_cash: Decimal,
    ) -> Result<bool, LedgerError> {
        let created = self
            .store
            .create_portfolio(&Portfolio::new(agent_name, starting_cash))?;
        if created {
            info!(agent = %agent_name, cash = %starting_cash, "Opened portfolio");
        }
        Ok(created)
    }

    pub fn portfolio(&self, agent_name: &str) -> Result<Portfolio, LedgerError> {
        self.store
            .get_portfolio(agent_name)?
            .ok_or_else(|| LedgerError::NotFound(agent_name.to_string()))
    }

    pub fn portfolios(&self) -> Result<Vec<Portfolio>, LedgerError> {
        self.store.list_portfolios()
    }

    /// Apply one trade to the agent's portfolio.
    ///
    /// Refused trades (`InsufficientFunds`, `InsufficientPosition`) and
    /// `NoAction` never write. Price and quantity are trusted as given.
    pub fn apply_trade(
        &self,
        agent_name: &str,
        action: TradeAction,
        symbol: &str,
        price: Decimal,
        quantity: u64,
    ) -> Result<TradeOutcome, LedgerError> {
        self.apply(agent_name, action, symbol, price, quantity, None)
    }

    /// Like `apply_trade`, but a successful trade commits `event` in the same
    /// write as the portfolio. Refused trades write neither.
    pub fn apply_trade_recorded(&self, event: &TradeEvent) -> Result<TradeOutcome, LedgerError> {
        self.apply(
            &event.agent_name,
            event.action,
            &event.symbol,
            event.price,
            event.quantity,
            Some(event),
        )
    }

    fn apply(
        &self,
        agent_name: &str,
        action: TradeAction,
        symbol: &str,
        price: Decimal,
        quantity: u64,
        event: Option<&TradeEvent>,
    ) -> Result<TradeOutcome, LedgerError> {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let mut portfolio = self.portfolio(agent_name)?;
            let outcome = portfolio.apply_trade(action, symbol, price, quantity, Utc::now());
            if outcome != TradeOutcome::Success {
                debug!(agent = %agent_name, %action, %symbol, ?outcome, "Trade not applied");
                return Ok(outcome);
            }

            let committed = match event {
                Some(event) => self.store.commit_trade(&portfolio, event)?,
                None => self.store.update_portfolio(&portfolio)?,
            };
            if committed {
                info!(
                    agent = %agent_name,
                    %action,
                    %symbol,
                    %price,
                    quantity,
                    cash = %portfolio.cash,
                    total_value = %portfolio.total_value,
                    "Portfolio updated"
                );
                return Ok(outcome);
            }

            warn!(agent = %agent_name, attempt, "Portfolio changed concurrently, retrying");
        }

        Err(LedgerError::Conflict(agent_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;
    use chrono::DateTime;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ledger_with(agent: &str, cash: Decimal) -> PortfolioLedger {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let ledger = PortfolioLedger::new(store);
        ledger.open_account(agent, cash).unwrap();
        ledger
    }

    #[test]
    fn buy_then_sell() {
        let ledger = ledger_with("a", dec!(1000));
        let outcome = ledger
            .apply_trade("a", TradeAction::Buy, "NVDA", dec!(150), 5)
            .unwrap();
        assert_eq!(outcome, TradeOutcome::Success);

        let outcome = ledger
            .apply_trade("a", TradeAction::Sell, "NVDA", dec!(160), 5)
            .unwrap();
        assert_eq!(outcome, TradeOutcome::Success);

        let p = ledger.portfolio("a").unwrap();
        assert_eq!(p.cash, dec!(1050));
        assert_eq!(p.shares("NVDA"), 0);
        assert_eq!(p.total_value, dec!(1050));
        assert_eq!(p.version, 2);
    }

    #[test]
    fn refused_trade_does_not_write() {
        let ledger = ledger_with("a", dec!(1000));
        let outcome = ledger
            .apply_trade("a", TradeAction::Buy, "NVDA", dec!(150), 10)
            .unwrap();
        assert!(matches!(outcome, TradeOutcome::InsufficientFunds { .. }));
        let p = ledger.portfolio("a").unwrap();
        assert_eq!(p.version, 0);
        assert_eq!(p.cash, dec!(1000));
    }

    #[test]
    fn missing_agent_is_not_found() {
        let ledger = ledger_with("a", dec!(1000));
        let err = ledger
            .apply_trade("ghost", TradeAction::Buy, "NVDA", dec!(1), 1)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(name) if name == "ghost"));
    }

    #[test]
    fn open_account_twice_keeps_first_balance() {
        let ledger = ledger_with("a", dec!(1000));
        assert!(!ledger.open_account("a", dec!(1)).unwrap());
        assert_eq!(ledger.portfolio("a").unwrap().cash, dec!(1000));
    }

    /// Store wrapper that lets a competing writer commit between the
    /// ledger's read and its write, a fixed number of times.
    struct RacingStore {
        inner: SqliteStore,
        races_left: AtomicUsize,
    }

    impl LedgerStore for RacingStore {
        fn get_portfolio(&self, agent_name: &str) -> Result<Option<Portfolio>, LedgerError> {
            let snapshot = self.inner.get_portfolio(agent_name)?;
            if self.races_left.load(Ordering::SeqCst) > 0 {
                self.races_left.fetch_sub(1, Ordering::SeqCst);
                let mut rival = self.inner.get_portfolio(agent_name)?.unwrap();
                rival.apply_trade(TradeAction::Buy, "AAPL", dec!(100), 1, Utc::now());
                assert!(self.inner.update_portfolio(&rival)?);
            }
            Ok(snapshot)
        }
        fn update_portfolio(&self, portfolio: &Portfolio) -> Result<bool, LedgerError> {
            self.inner.update_portfolio(portfolio)
        }
        fn insert_event(&self, event: &TradeEvent) -> Result<(), LedgerError> {
            self.inner.insert_event(event)
        }
        fn commit_trade(
            &self,
            portfolio: &Portfolio,
            event: &TradeEvent,
        ) -> Result<bool, LedgerError> {
            self.inner.commit_trade(portfolio, event)
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

    fn racing_ledger(races: usize) -> PortfolioLedger {
        let store = RacingStore {
            inner: SqliteStore::open_in_memory().unwrap(),
            races_left: AtomicUsize::new(races),
        };
        let ledger = PortfolioLedger::new(Arc::new(store));
        ledger.open_account("a", dec!(1000)).unwrap();
        ledger
    }

    #[test]
    fn concurrent_write_is_not_lost() {
        let ledger = racing_ledger(1);
        let outcome = ledger
            .apply_trade("a", TradeAction::Buy, "NVDA", dec!(150), 2)
            .unwrap();
        assert_eq!(outcome, TradeOutcome::Success);

        let p = ledger.portfolio("a").unwrap();
        // Rival bought 1 AAPL @ 100, we bought 2 NVDA @ 150.
        assert_eq!(p.cash, dec!(600));
        assert_eq!(p.shares("AAPL"), 1);
        assert_eq!(p.shares("NVDA"), 2);
        assert_eq!(p.version, 2);
    }

    #[test]
    fn recorded_trade_survives_a_race_with_one_event() {
        let ledger = racing_ledger(1);
        let event = TradeEvent::new(
            "a",
            "NVDA",
            TradeAction::Buy,
            dec!(150),
            2,
            "breakout".to_string(),
            false,
        );
        let outcome = ledger.apply_trade_recorded(&event).unwrap();
        assert_eq!(outcome, TradeOutcome::Success);

        let logged = ledger
            .store()
            .events_since("a", Utc::now() - chrono::Duration::minutes(5))
            .unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].id, event.id);
        assert_eq!(ledger.portfolio("a").unwrap().shares("NVDA"), 2);
    }

    #[test]
    fn persistent_contention_gives_up() {
        let ledger = racing_ledger(MAX_UPDATE_ATTEMPTS);
        let err = ledger
            .apply_trade("a", TradeAction::Buy, "NVDA", dec!(10), 1)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(ledger.portfolio("a").unwrap().shares("NVDA"), 0);
    }
}
