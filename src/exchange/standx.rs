//! StandX venue client.
//!
//! StandX has no bulk endpoint, so each symbol costs one funding-rate
//! query (last 24h window, newest entry wins) and one price query, issued
//! concurrently. Symbol-level failures are logged and skipped; the venue
//! only errors as a whole when nothing is reachable.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::exchange::errors::ExchangeError;
use crate::exchange::types::RateSample;
use crate::exchange::{ExchangeAdapter, json_number};
use crate::time::now_ms;

const EXCHANGE: &str = "StandX";
const DEFAULT_URL: &str = "https://perps.standx.com";

const FUNDING_LOOKBACK_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Clone)]
pub struct StandXClient {
    http: Client,
    url: String,
}

impl StandXClient {
    pub fn new() -> Result<Self, ExchangeError> {
        Self::with_url(DEFAULT_URL.to_string())
    }

    pub fn with_url(url: String) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, url })
    }

    fn venue_symbol(requested: &str) -> &str {
        match requested {
            "BTC-PERP" => "BTC-USD",
            other => other,
        }
    }

    async fn fetch_symbol(&self, requested: &str) -> Result<RateSample, ExchangeError> {
        let venue_symbol = Self::venue_symbol(requested);

        let end_ms = now_ms() as i64;
        let start_ms = end_ms - FUNDING_LOOKBACK_MS;

        let funding_req = self
            .http
            .get(format!("{}/api/query_funding_rates", self.url))
            .query(&[
                ("symbol", venue_symbol.to_string()),
                ("start_time", start_ms.to_string()),
                ("end_time", end_ms.to_string()),
            ])
            .send();
        let price_req = self
            .http
            .get(format!("{}/api/query_symbol_price", self.url))
            .query(&[("symbol", venue_symbol)])
            .send();

        let (funding_resp, price_resp) = tokio::join!(funding_req, price_req);

        let funding: Value = funding_resp?.error_for_status()?.json().await?;
        let entry = latest_funding_entry(&funding)
            .ok_or(ExchangeError::InvalidResponse("no funding entries"))?;
        let rate = entry
            .get("funding_rate")
            .and_then(json_number)
            .ok_or(ExchangeError::InvalidResponse("no parsable funding_rate"))?;

        // Price is best-effort; a failed price query must not cost the rate.
        let price_payload = match price_resp.and_then(|r| r.error_for_status()) {
            Ok(resp) => resp.json::<Value>().await.ok(),
            Err(e) => {
                warn!(symbol = %requested, error = %e, "standx price query failed");
                None
            }
        };
        let price = price_payload.as_ref().and_then(mark_or_last_price);

        let now = Utc::now();
        Ok(RateSample {
            exchange: EXCHANGE.to_string(),
            symbol: requested.to_string(),
            funding_rate: rate,
            sampled_at: now,
            price,
            raw: Some(json!({ "funding": entry, "price": price_payload })),
        })
    }
}

/// Newest entry of a funding-rate history payload. Accepts either a bare
/// array (ordered arbitrarily, `time` field decides) or a single object.
fn latest_funding_entry(payload: &Value) -> Option<&Value> {
    match payload {
        Value::Array(items) => items
            .iter()
            .filter(|item| item.is_object())
            .max_by_key(|item| item.get("time").and_then(Value::as_str).unwrap_or("")),
        Value::Object(_) => Some(payload),
        _ => None,
    }
}

fn mark_or_last_price(payload: &Value) -> Option<f64> {
    payload
        .get("mark_price")
        .and_then(json_number)
        .or_else(|| payload.get("last_price").and_then(json_number))
}

#[async_trait]
impl ExchangeAdapter for StandXClient {
    fn name(&self) -> &'static str {
        EXCHANGE
    }

    #[instrument(skip(self, symbols), level = "debug")]
    async fn fetch(&self, symbols: &[String]) -> Result<Vec<RateSample>, ExchangeError> {
        let fetches = symbols.iter().map(|s| self.fetch_symbol(s));
        let results = futures::future::join_all(fetches).await;

        let mut out = Vec::new();
        for (symbol, result) in symbols.iter().zip(results) {
            match result {
                Ok(sample) => out.push(sample),
                Err(e) => warn!(symbol = %symbol, error = %e, "standx symbol fetch failed"),
            }
        }

        debug!(count = out.len(), "standx funding rates fetched");

        Ok(out)
    }
}
