use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    /// Missing API key, model id or provider. The agent holds this cycle.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decision parse error: {0}")]
    Parse(String),

    #[error("Decision timed out after {0} seconds")]
    Timeout(u64),

    #[error("Ledger error: {0}")]
    Ledger(#[from] arena_ledger::LedgerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
