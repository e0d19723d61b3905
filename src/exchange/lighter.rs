//! Lighter venue client.
//!
//! One `GET /funding-rates` call covers every market; entries are matched
//! against the requested symbols through a symbol map. Lighter quotes a
//! per-8-hour rate, normalized here to the hourly rate the rest of the
//! system works in.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::exchange::errors::ExchangeError;
use crate::exchange::types::RateSample;
use crate::exchange::{ExchangeAdapter, json_number};

const EXCHANGE: &str = "Lighter";
const DEFAULT_URL: &str = "https://mainnet.zklighter.elliot.ai/api/v1";

/// Hours covered by one Lighter funding window; quoted rates are
/// per-window and normalized to hourly.
const FUNDING_WINDOW_HOURS: f64 = 8.0;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FundingRatesResponse {
    Envelope { funding_rates: Vec<Value> },
    Bare(Vec<Value>),
}

impl FundingRatesResponse {
    fn into_items(self) -> Vec<Value> {
        match self {
            Self::Envelope { funding_rates } => funding_rates,
            Self::Bare(items) => items,
        }
    }
}

#[derive(Clone)]
pub struct LighterClient {
    http: Client,
    url: String,
}

impl LighterClient {
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
            "BTC-PERP" => "BTC",
            other => other,
        }
    }
}

#[async_trait]
impl ExchangeAdapter for LighterClient {
    fn name(&self) -> &'static str {
        EXCHANGE
    }

    #[instrument(skip(self, symbols), level = "debug")]
    async fn fetch(&self, symbols: &[String]) -> Result<Vec<RateSample>, ExchangeError> {
        let url = format!("{}/funding-rates", self.url);

        let resp = self.http.get(&url).send().await?.error_for_status()?;
        let body: FundingRatesResponse = resp.json().await?;
        let items = body.into_items();

        let by_symbol: HashMap<&str, &Value> = items
            .iter()
            .filter_map(|item| Some((item.get("symbol")?.as_str()?, item)))
            .collect();

        let now = Utc::now();
        let mut out = Vec::new();

        for requested in symbols {
            let Some(item) = by_symbol.get(Self::venue_symbol(requested)) else {
                continue;
            };

            let Some(rate) = item.get("rate").and_then(json_number) else {
                warn!(symbol = %requested, "lighter entry has no parsable rate");
                continue;
            };

            out.push(RateSample {
                exchange: EXCHANGE.to_string(),
                symbol: requested.clone(),
                funding_rate: rate / FUNDING_WINDOW_HOURS,
                sampled_at: now,
                price: None,
                raw: Some((*item).clone()),
            });
        }

        debug!(count = out.len(), "lighter funding rates fetched");

        Ok(out)
    }
}
