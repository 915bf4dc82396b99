use arena_models::portfolio::Portfolio;
use arena_models::trade::TradeEvent;
use chrono::{DateTime, Utc};

use crate::error::LedgerError;

/// Storage seam for portfolios and the trade log. Mockable for testing.
///
/// The core only needs read-one-by-key, update-one-by-key, insert-one,
/// count-by-key-and-time-range and the atomic trade commit. The remaining
/// methods serve account setup and display.
pub trait LedgerStore: Send + Sync {
    fn get_portfolio(&self, agent_name: &str) -> Result<Option<Portfolio>, LedgerError>;

    /// Conditional write keyed by `agent_name`.
    ///
    /// Succeeds only while the stored version still equals `portfolio.version`
    /// and bumps it by one. Returns `false` when another writer got there first.
    fn update_portfolio(&self, portfolio: &Portfolio) -> Result<bool, LedgerError>;

    fn insert_event(&self, event: &TradeEvent) -> Result<(), LedgerError>;

    /// `update_portfolio` and `insert_event` as one atomic write.
    ///
    /// Returns `false`, with nothing written, on a version mismatch. Any error
    /// leaves both the portfolio and the log untouched.
    fn commit_trade(&self, portfolio: &Portfolio, event: &TradeEvent) -> Result<bool, LedgerError>;

    fn count_events_since(
        &self,
        agent_name: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, LedgerError>;

    /// Insert a new portfolio row. Returns `false` if the agent already has one.
    fn create_portfolio(&self, portfolio: &Portfolio) -> Result<bool, LedgerError>;

    fn list_portfolios(&self) -> Result<Vec<Portfolio>, LedgerError>;

    /// Events for an agent at or after `since`, oldest first.
    fn events_since(
        &self,
        agent_name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TradeEvent>, LedgerError>;
}
