use serde::Serialize;

/// The two venues whose rates define the spread aggregates. Spread is an
/// inherently pairwise metric; widening it to N venues would change its
/// definition (max-min? all-pairs mean?), so the pair is fixed by name.
pub const REFERENCE_EXCHANGES: [&str; 2] = ["Lighter", "StandX"];

/// Bucket width used to align samples from different venues.
pub const SPREAD_BUCKET_SECS: i64 = 60;

/// Heatmap admission window: only samples within this many seconds of the
/// top of the hour count, so the hour-of-week cells aren't diluted by
/// intra-hour ticks. Sized for the default 30s poll cadence (admits the
/// :00 tick, rejects the :30 one); a very different cadence yields a
/// sparse heatmap.
pub const HEATMAP_HOUR_WINDOW_SECS: i64 = 25;

/// Trailing window of the dashboard's rolling spread stats.
pub const ROLLING_WINDOW_SECS: i64 = 86_400;

/// Annualized percentage from an hourly funding rate.
pub fn apr_from_hourly(rate: f64) -> f64 {
    rate * 24.0 * 365.0 * 100.0
}

/// One persisted observation, as served by the history endpoint. The
/// symbol is implied by the query.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRow {
    pub exchange: String,
    pub funding_rate: f64,
    pub price: Option<f64>,
    pub timestamp: i64,
}

/// Rolling cross-exchange spread over a trailing window, annualized.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SpreadStats {
    pub max_spread_apr: f64,
    pub avg_spread_apr: f64,
}

/// One hour-of-week heatmap cell. Weekday is days from Sunday (0-6),
/// hour is 0-23 UTC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub weekday: u32,
    pub hour: u32,
    pub avg_spread_apr: f64,
    pub data_points: u64,
}
