use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No portfolio for agent: {0}")]
    NotFound(String),

    #[error("Portfolio for {0} kept changing during update")]
    Conflict(String),

    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),

    #[error("Ledger not available: {0}")]
    Unavailable(String),
}
