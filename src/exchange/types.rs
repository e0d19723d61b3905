use chrono::{DateTime, Utc};
use serde::Serialize;

/// One funding-rate observation, normalized at the adapter boundary.
/// Exchange-specific response shapes never leak past `fetch`.
#[derive(Debug, Clone, Serialize)]
pub struct RateSample {
    pub exchange: String,
    pub symbol: String,

    /// Signed fraction per funding interval (0.0001 = 0.01%).
    /// Never annualized here; APR conversion happens at aggregation time.
    pub funding_rate: f64,

    /// Observation instant, second precision. Dedup/bucket key.
    pub sampled_at: DateTime<Utc>,

    /// Mark price, when the venue reports one.
    pub price: Option<f64>,

    /// Original venue payload, kept for audit only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl RateSample {
    pub fn timestamp_secs(&self) -> i64 {
        self.sampled_at.timestamp()
    }
}
