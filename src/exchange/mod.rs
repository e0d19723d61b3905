pub mod errors;
pub mod lighter;
pub mod standx;
pub mod types;

pub use errors::ExchangeError;
pub use lighter::LighterClient;
pub use standx::StandXClient;
pub use types::RateSample;

use async_trait::async_trait;

/// Venue client contract.
///
/// `fetch` returns the subset of requested symbols it could resolve and
/// must not fail on partial results; symbol-level problems are logged
/// inside the adapter. An `Err` means the whole venue was unreachable
/// and is treated by the monitor as zero samples for that tick.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, symbols: &[String]) -> Result<Vec<RateSample>, ExchangeError>;
}

/// Venues are inconsistent about numeric fields; accept both JSON numbers
/// and numeric strings.
pub(crate) fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
