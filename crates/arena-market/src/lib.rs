pub mod error;
pub mod gateway;
pub mod hours;
pub mod synthetic;

pub use error::MarketError;
pub use gateway::{MarketDataGateway, QuoteSource};
pub use hours::{AlwaysOpen, MarketHoursGate, MarketStatus, UsEquityHours};
pub use synthetic::synthetic_quote;
