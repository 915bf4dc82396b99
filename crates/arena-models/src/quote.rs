use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price observation for one symbol, real or synthetic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub symbol: String,
    /// The figure trades execute at. Always positive.
    pub price: Decimal,
    /// One-line description handed to the decision source.
    pub summary: String,
    pub simulated: bool,
    pub as_of: DateTime<Utc>,
}
