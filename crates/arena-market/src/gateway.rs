use std::collections::HashMap;
use std::time::Duration;

use arena_models::config::MarketDataConfig;
use arena_models::quote::Quote;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::MarketError;
use crate::synthetic::synthetic_quote;

/// Source of the price an agent trades at.
///
/// Infallible by contract: implementations degrade instead of erroring, and
/// every returned price is strictly positive.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(&self, symbol: &str) -> Quote;
}

#[derive(Debug, Deserialize)]
struct Bar {
    t: DateTime<Utc>,
    c: f64,
    #[serde(default)]
    v: f64,
}

/// Single-symbol endpoints return a list, multi-symbol ones a map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Bars {
    List(Vec<Bar>),
    BySymbol(HashMap<String, Vec<Bar>>),
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    #[serde(default)]
    bars: Option<Bars>,
}

/// HTTP bars gateway with a synthetic fallback and a short-lived quote cache.
///
/// Concurrent requests for the same symbol share one upstream call, so agents
/// trading the same symbol in a cycle see the same price.
pub struct MarketDataGateway {
    client: reqwest::Client,
    config: MarketDataConfig,
    credentials: Option<(String, String)>,
    cache: Cache<String, Quote>,
}

impl MarketDataGateway {
    /// Build a gateway, reading credentials from the configured env vars.
    pub fn new(config: MarketDataConfig) -> Result<Self, MarketError> {
        let credentials = match (
            std::env::var(&config.api_key_env),
            std::env::var(&config.api_secret_env),
        ) {
            (Ok(key), Ok(secret)) if !key.is_empty() && !secret.is_empty() => Some((key, secret)),
            _ => None,
        };
        Self::with_credentials(config, credentials)
    }

    pub fn with_credentials(
        config: MarketDataConfig,
        credentials: Option<(String, String)>,
    ) -> Result<Self, MarketError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let cache = Cache::builder()
            .max_capacity(config.quote_cache_capacity)
            .time_to_live(Duration::from_secs(config.quote_ttl_seconds))
            .build();
        Ok(Self {
            client,
            config,
            credentials,
            cache,
        })
    }

    /// Fetch the latest bar from the provider, bypassing the cache.
    pub async fn fetch(&self, symbol: &str) -> Result<Quote, MarketError> {
        let (key, secret) = self
            .credentials
            .as_ref()
            .ok_or_else(|| MarketError::MissingCredentials(self.config.api_key_env.clone()))?;

        let url = format!(
            "{}/v2/stocks/{symbol}/bars",
            self.config.base_url.trim_end_matches('/')
        );
        let limit = self.config.bar_limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("timeframe", self.config.timeframe.as_str()),
                ("limit", limit.as_str()),
            ])
            .header("APCA-API-KEY-ID", key)
            .header("APCA-API-SECRET-KEY", secret)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::Status(status.as_u16()));
        }

        let body: BarsResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Malformed(e.to_string()))?;
        latest_quote(symbol, body)
    }

    pub fn cached_symbols(&self) -> u64 {
        self.cache.entry_count()
    }
}

fn latest_quote(symbol: &str, body: BarsResponse) -> Result<Quote, MarketError> {
    let bars = match body.bars {
        Some(Bars::List(bars)) => bars,
        Some(Bars::BySymbol(mut by_symbol)) => by_symbol.remove(symbol).unwrap_or_default(),
        None => Vec::new(),
    };
    let bar = bars
        .into_iter()
        .max_by_key(|bar| bar.t)
        .ok_or_else(|| MarketError::Malformed(format!("no bars for {symbol}")))?;

    let price = Decimal::try_from(bar.c)
        .map_err(|e| MarketError::Malformed(format!("close {}: {e}", bar.c)))?
        .round_dp(4);
    if price <= Decimal::ZERO {
        return Err(MarketError::Malformed(format!("non-positive close {price}")));
    }

    Ok(Quote {
        symbol: symbol.to_string(),
        price,
        summary: format!(
            "Symbol: {symbol}, Price: {price}, Volume: {}, Time: {}",
            bar.v,
            bar.t.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        simulated: false,
        as_of: bar.t,
    })
}

#[async_trait]
impl QuoteSource for MarketDataGateway {
    async fn quote(&self, symbol: &str) -> Quote {
        self.cache
            .get_with(symbol.to_string(), async {
                match self.fetch(symbol).await {
                    Ok(quote) => {
                        debug!(%symbol, price = %quote.price, "Fetched quote");
                        quote
                    }
                    Err(e) => {
                        warn!(
                            %symbol,
                            error = %e,
                            "Market data unavailable, using simulated price"
                        );
                        synthetic_quote(symbol)
                    }
                }
            })
            .await
    }
}
