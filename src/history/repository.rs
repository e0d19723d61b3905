use async_trait::async_trait;

use crate::exchange::types::RateSample;
use crate::history::model::{HeatmapCell, HistoryRow, SpreadStats};

/// Append/read contract over the persisted sample log.
///
/// The monitor is the only writer; the dashboard issues concurrent reads.
#[async_trait]
pub trait SampleRepository: Send + Sync {
    /// Idempotent append: a row with the same
    /// `(exchange, symbol, timestamp_seconds)` already present makes this
    /// a no-op. I/O failures are logged and the sample is dropped from
    /// history — the board already reflects it in memory, so the caller
    /// is never failed.
    async fn append(&self, sample: &RateSample);

    /// Up to `2 x limit` newest-first rows for `symbol` across all
    /// exchanges. The 2x headroom covers the exchanges sharing one
    /// timestamp; callers wanting per-exchange truncation filter further.
    async fn history(&self, symbol: &str, limit: u32) -> anyhow::Result<Vec<HistoryRow>>;

    /// Spread stats between the reference exchanges over the trailing
    /// window, from minute-bucketed averages joined on bucket id.
    async fn rolling_spread(&self, symbol: &str, window_secs: i64)
    -> anyhow::Result<SpreadStats>;

    /// Hour-of-week spread heatmap over all retained history, restricted
    /// to top-of-hour samples.
    async fn heatmap(&self, symbol: &str) -> anyhow::Result<Vec<HeatmapCell>>;
}
