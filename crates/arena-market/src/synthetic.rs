use arena_models::quote::Quote;
use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use rust_decimal::Decimal;

/// Tag carried by every synthetic summary.
pub const SIMULATED_TAG: &str = "[SIMULATED]";

/// Jitter bound in basis points (±2%).
const MAX_JITTER_BP: i64 = 200;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME))
}

/// Deterministic base price in `[20.00, 520.00)` for a symbol.
pub fn base_price(symbol: &str) -> Decimal {
    let cents = fnv1a(symbol.to_ascii_uppercase().as_bytes()) % 50_000;
    Decimal::new(2_000 + cents as i64, 2)
}

/// A synthetic quote with uniform jitter of ±2% around the symbol's base price.
pub fn synthetic_quote(symbol: &str) -> Quote {
    let jitter_bp = rand::thread_rng().gen_range(-MAX_JITTER_BP..=MAX_JITTER_BP);
    synthetic_quote_with(symbol, jitter_bp, Utc::now())
}

/// Same as [`synthetic_quote`] with the jitter (in basis points) fixed.
pub fn synthetic_quote_with(symbol: &str, jitter_bp: i64, now: DateTime<Utc>) -> Quote {
    let jitter_bp = jitter_bp.clamp(-MAX_JITTER_BP, MAX_JITTER_BP);
    let factor = Decimal::ONE + Decimal::new(jitter_bp, 4);
    let price = (base_price(symbol) * factor)
        .round_dp(2)
        .max(Decimal::new(1, 2));

    Quote {
        symbol: symbol.to_string(),
        price,
        summary: format!(
            "{SIMULATED_TAG} Symbol: {symbol}, Price: {price}, Volume: N/A, Time: {}",
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        simulated: true,
        as_of: now,
    }
}
