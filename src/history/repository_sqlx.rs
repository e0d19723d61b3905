use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use sqlx::{AnyPool, Row};
use tracing::warn;

use crate::exchange::types::RateSample;
use crate::history::model::{
    HEATMAP_HOUR_WINDOW_SECS, HeatmapCell, HistoryRow, REFERENCE_EXCHANGES,
    SPREAD_BUCKET_SECS, SpreadStats, apr_from_hourly,
};
use crate::history::repository::SampleRepository;
use crate::time::now_secs;

/// SQLx-backed implementation of SampleRepository.
///
/// SQL produces the per-exchange minute-bucket averages; the bucket join,
/// annualization, and hour-of-week grouping happen here in plain code so
/// the load-bearing constants stay testable.
pub struct SqlxSampleRepository {
    pool: Arc<AnyPool>,
}

impl SqlxSampleRepository {
    pub fn new(pool: Arc<AnyPool>) -> Self {
        Self { pool }
    }

    async fn try_append(&self, sample: &RateSample) -> anyhow::Result<()> {
        let ts = sample.timestamp_secs();

        // Dedup on the identical second, not a constraint-violation path.
        let existing = sqlx::query(
            r#"SELECT 1 FROM funding_history WHERE exchange = ? AND symbol = ? AND timestamp = ?;"#,
        )
        .bind(&sample.exchange)
        .bind(&sample.symbol)
        .bind(ts)
        .fetch_optional(&*self.pool)
        .await?;

        if existing.is_some() {
            return Ok(());
        }

        sqlx::query(
            r#"
INSERT INTO funding_history (exchange, symbol, funding_rate, price, timestamp)
VALUES (?, ?, ?, ?, ?);
"#,
        )
        .bind(&sample.exchange)
        .bind(&sample.symbol)
        .bind(sample.funding_rate)
        .bind(sample.price)
        .bind(ts)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Per-minute average rate for one exchange, keyed by bucket id
    /// (`timestamp / 60`), over rows newer than `cutoff`.
    async fn minute_buckets_since(
        &self,
        symbol: &str,
        exchange: &str,
        cutoff: i64,
    ) -> anyhow::Result<BTreeMap<i64, f64>> {
        let rows = sqlx::query(
            r#"
SELECT timestamp / 60 AS bucket, AVG(funding_rate) AS funding_rate
FROM funding_history
WHERE symbol = ? AND exchange = ? AND timestamp > ?
GROUP BY bucket;
"#,
        )
        .bind(symbol)
        .bind(exchange)
        .bind(cutoff)
        .fetch_all(&*self.pool)
        .await?;

        collect_buckets(rows)
    }

    /// Same bucketing over all retained history, but only samples close
    /// enough to the top of the hour to belong in hour-granular cells.
    async fn minute_buckets_top_of_hour(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> anyhow::Result<BTreeMap<i64, f64>> {
        let rows = sqlx::query(
            r#"
SELECT timestamp / 60 AS bucket, AVG(funding_rate) AS funding_rate
FROM funding_history
WHERE symbol = ? AND exchange = ? AND (timestamp % 3600) < ?
GROUP BY bucket;
"#,
        )
        .bind(symbol)
        .bind(exchange)
        .bind(HEATMAP_HOUR_WINDOW_SECS)
        .fetch_all(&*self.pool)
        .await?;

        collect_buckets(rows)
    }
}

#[async_trait]
impl SampleRepository for SqlxSampleRepository {
    async fn append(&self, sample: &RateSample) {
        if let Err(e) = self.try_append(sample).await {
            warn!(
                error = %e,
                exchange = %sample.exchange,
                symbol = %sample.symbol,
                "dropping sample, history insert failed"
            );
        }
    }

    async fn history(&self, symbol: &str, limit: u32) -> anyhow::Result<Vec<HistoryRow>> {
        let rows = sqlx::query(
            r#"
SELECT exchange, funding_rate, price, timestamp
FROM funding_history
WHERE symbol = ?
ORDER BY timestamp DESC
LIMIT ?;
"#,
        )
        .bind(symbol)
        .bind(i64::from(limit) * 2)
        .fetch_all(&*self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_history(&r) {
                Ok(row) => out.push(row),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the query
                    warn!(error = %e, "skipping malformed history row");
                }
            }
        }

        Ok(out)
    }

    async fn rolling_spread(
        &self,
        symbol: &str,
        window_secs: i64,
    ) -> anyhow::Result<SpreadStats> {
        let cutoff = now_secs() - window_secs;
        let [left, right] = REFERENCE_EXCHANGES;

        let left = self.minute_buckets_since(symbol, left, cutoff).await?;
        let right = self.minute_buckets_since(symbol, right, cutoff).await?;

        Ok(spread_stats(&left, &right))
    }

    async fn heatmap(&self, symbol: &str) -> anyhow::Result<Vec<HeatmapCell>> {
        let [left, right] = REFERENCE_EXCHANGES;

        let left = self.minute_buckets_top_of_hour(symbol, left).await?;
        let right = self.minute_buckets_top_of_hour(symbol, right).await?;

        Ok(heatmap_cells(&left, &right))
    }
}

fn collect_buckets(rows: Vec<sqlx::any::AnyRow>) -> anyhow::Result<BTreeMap<i64, f64>> {
    let mut out = BTreeMap::new();
    for r in rows {
        let bucket: i64 = r.try_get("bucket").context("bucket column")?;
        let rate: f64 = r.try_get("funding_rate").context("funding_rate column")?;
        out.insert(bucket, rate);
    }
    Ok(out)
}

fn row_to_history(r: &sqlx::any::AnyRow) -> anyhow::Result<HistoryRow> {
    Ok(HistoryRow {
        exchange: r.try_get::<String, _>("exchange")?,
        funding_rate: r.try_get::<f64, _>("funding_rate")?,
        price: r.try_get::<Option<f64>, _>("price")?,
        timestamp: r.try_get::<i64, _>("timestamp")?,
    })
}

/// Join the two exchanges' buckets and reduce |diff| to max/avg APR.
/// Buckets present on only one side carry no spread information.
fn spread_stats(left: &BTreeMap<i64, f64>, right: &BTreeMap<i64, f64>) -> SpreadStats {
    let mut max = 0.0_f64;
    let mut sum = 0.0_f64;
    let mut joined = 0_u64;

    for (bucket, l) in left {
        let Some(r) = right.get(bucket) else { continue };
        let spread = (l - r).abs();
        max = max.max(spread);
        sum += spread;
        joined += 1;
    }

    if joined == 0 {
        return SpreadStats::default();
    }

    SpreadStats {
        max_spread_apr: apr_from_hourly(max),
        avg_spread_apr: apr_from_hourly(sum / joined as f64),
    }
}

/// Group joined buckets by `(weekday, hour)` of the bucket's instant and
/// average the annualized spread per cell. BTreeMap keying orders the
/// output by weekday, then hour.
fn heatmap_cells(left: &BTreeMap<i64, f64>, right: &BTreeMap<i64, f64>) -> Vec<HeatmapCell> {
    let mut cells: BTreeMap<(u32, u32), (f64, u64)> = BTreeMap::new();

    for (bucket, l) in left {
        let Some(r) = right.get(bucket) else { continue };
        let Some(instant) = DateTime::<Utc>::from_timestamp(bucket * SPREAD_BUCKET_SECS, 0)
        else {
            continue;
        };

        let key = (instant.weekday().num_days_from_sunday(), instant.hour());
        let cell = cells.entry(key).or_insert((0.0, 0));
        cell.0 += apr_from_hourly((l - r).abs());
        cell.1 += 1;
    }

    cells
        .into_iter()
        .map(|((weekday, hour), (sum, n))| HeatmapCell {
            weekday,
            hour,
            avg_spread_apr: sum / n as f64,
            data_points: n,
        })
        .collect()
}
