pub mod error;
pub mod execution;
pub mod ledger;
pub mod quota;
pub mod sqlite;
pub mod store;

pub use error::LedgerError;
pub use execution::TradeExecutor;
pub use ledger::PortfolioLedger;
pub use quota::QuotaTracker;
pub use sqlite::SqliteStore;
pub use store::LedgerStore;
