use thiserror::Error;

/// Reasons the primary market data call could not produce a quote.
///
/// Never surfaced past the gateway: each one turns into a synthetic fallback.
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {0}")]
    Status(u16),

    #[error("Malformed bars response: {0}")]
    Malformed(String),

    #[error("Missing credentials: {0} not set")]
    MissingCredentials(String),
}
