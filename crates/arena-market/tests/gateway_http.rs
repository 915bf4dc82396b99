//! Gateway behaviour against a local HTTP server standing in for the
//! bars provider, and against an unreachable endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arena_market::{MarketDataGateway, QuoteSource};
use arena_models::config::MarketDataConfig;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

#[derive(Clone, Default)]
struct Provider {
    hits: Arc<AtomicUsize>,
}

async fn bars(
    State(provider): State<Provider>,
    Path(symbol): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    provider.hits.fetch_add(1, Ordering::SeqCst);
    if headers.get("APCA-API-KEY-ID").map(|v| v.as_bytes()) != Some(b"key".as_slice()) {
        return (StatusCode::FORBIDDEN, Json(json!({"message": "forbidden"})));
    }
    match symbol.as_str() {
        "BROKEN" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
        "EMPTY" => (StatusCode::OK, Json(json!({"bars": [], "symbol": "EMPTY"}))),
        _ => (
            StatusCode::OK,
            Json(json!({
                "bars": [
                    {"t": "2025-06-03T19:30:00Z", "o": 1.0, "h": 1.0, "l": 1.0, "c": 120.5, "v": 10},
                    {"t": "2025-06-03T19:45:00Z", "o": 1.0, "h": 1.0, "l": 1.0, "c": 121.75, "v": 42}
                ],
                "symbol": symbol,
                "next_page_token": null
            })),
        ),
    }
}

async fn spawn_provider() -> (String, Provider) {
    let provider = Provider::default();
    let app = Router::new()
        .route("/v2/stocks/:symbol/bars", get(bars))
        .with_state(provider.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), provider)
}

fn config(base_url: &str) -> MarketDataConfig {
    MarketDataConfig {
        base_url: base_url.to_string(),
        timeout_seconds: 2,
        ..MarketDataConfig::default()
    }
}

fn creds(key: &str) -> Option<(String, String)> {
    Some((key.to_string(), "secret".to_string()))
}

#[tokio::test]
async fn real_quote_uses_latest_bar() {
    let (url, _) = spawn_provider().await;
    let gateway = MarketDataGateway::with_credentials(config(&url), creds("key")).unwrap();

    let quote = gateway.quote("NVDA").await;
    assert!(!quote.simulated);
    assert_eq!(quote.price, dec!(121.75));
    assert_eq!(
        quote.summary,
        "Symbol: NVDA, Price: 121.75, Volume: 42, Time: 2025-06-03T19:45:00Z"
    );
}

#[tokio::test]
async fn repeated_quotes_hit_provider_once() {
    let (url, provider) = spawn_provider().await;
    let gateway =
        Arc::new(MarketDataGateway::with_credentials(config(&url), creds("key")).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move { gateway.quote("AMD").await })
        })
        .collect();
    let mut prices = Vec::new();
    for handle in handles {
        prices.push(handle.await.unwrap().price);
    }

    assert!(prices.iter().all(|p| *p == prices[0]));
    assert_eq!(provider.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_status_falls_back() {
    let (url, _) = spawn_provider().await;
    let gateway = MarketDataGateway::with_credentials(config(&url), creds("key")).unwrap();

    for symbol in ["BROKEN", "EMPTY"] {
        let quote = gateway.quote(symbol).await;
        assert!(quote.simulated, "{symbol}");
        assert!(quote.price > Decimal::ZERO);
        assert!(quote.summary.contains("[SIMULATED]"));
    }
}

#[tokio::test]
async fn rejected_credentials_fall_back() {
    let (url, _) = spawn_provider().await;
    let gateway = MarketDataGateway::with_credentials(config(&url), creds("wrong")).unwrap();
    assert!(gateway.fetch("NVDA").await.is_err());
    assert!(gateway.quote("NVDA").await.simulated);
}

#[tokio::test]
async fn unreachable_provider_falls_back() {
    let gateway =
        MarketDataGateway::with_credentials(config("http://127.0.0.1:9"), creds("key")).unwrap();
    let quote = gateway.quote("TSLA").await;
    assert!(quote.simulated);
    assert!(quote.price > Decimal::ZERO);
}
