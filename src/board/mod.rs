use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::exchange::types::RateSample;

/// In-memory table of the latest sample per `(symbol, exchange)`.
///
/// The monitor is the only writer; the dashboard reads cloned snapshots,
/// so a handed-out map can never observe a later write. Rebuilt empty on
/// restart — history lives in the sample store.
#[derive(Clone, Default)]
pub struct RateBoard {
    inner: Arc<RwLock<HashMap<String, HashMap<String, RateSample>>>>,
}

impl RateBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, symbol: &str, exchange: &str) -> Option<RateSample> {
        let g = self.inner.read().await;
        g.get(symbol).and_then(|entries| entries.get(exchange)).cloned()
    }

    /// Replace the entry for the sample's `(symbol, exchange)` wholesale.
    pub async fn set(&self, sample: RateSample) {
        let mut g = self.inner.write().await;
        g.entry(sample.symbol.clone())
            .or_default()
            .insert(sample.exchange.clone(), sample);
    }

    /// Snapshot of every exchange entry for one symbol.
    pub async fn entries_for(&self, symbol: &str) -> HashMap<String, RateSample> {
        let g = self.inner.read().await;
        g.get(symbol).cloned().unwrap_or_default()
    }
}
