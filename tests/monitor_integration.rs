use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use tokio::sync::Mutex;
use uuid::Uuid;

use fundwatch::board::RateBoard;
use fundwatch::config::{AppConfig, Thresholds};
use fundwatch::db::schema;
use fundwatch::exchange::{ExchangeAdapter, ExchangeError};
use fundwatch::exchange::types::RateSample;
use fundwatch::history::repository::SampleRepository;
use fundwatch::history::repository_sqlx::SqlxSampleRepository;
use fundwatch::metrics::counters::Counters;
use fundwatch::monitor::Monitor;
use fundwatch::time::now_secs;

/// Venue double fed from a per-tick script of canned results.
struct ScriptedExchange {
    name: &'static str,
    script: Mutex<VecDeque<Result<Vec<RateSample>, ExchangeError>>>,
}

impl ScriptedExchange {
    fn new(
        name: &'static str,
        script: Vec<Result<Vec<RateSample>, ExchangeError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(script.into()),
        })
    }
}

#[async_trait]
impl ExchangeAdapter for ScriptedExchange {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _symbols: &[String]) -> Result<Vec<RateSample>, ExchangeError> {
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Venue double that never answers.
struct HungExchange;

#[async_trait]
impl ExchangeAdapter for HungExchange {
    fn name(&self) -> &'static str {
        "Hung"
    }

    async fn fetch(&self, _symbols: &[String]) -> Result<Vec<RateSample>, ExchangeError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

async fn setup_db() -> AnyPool {
    sqlx::any::install_default_drivers();

    let db_name = Uuid::new_v4().to_string();
    let conn_str = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&conn_str)
        .await
        .unwrap();

    schema::migrate(&pool).await.unwrap();

    pool
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "unused".to_string(),
        http_listen_addr: "unused".to_string(),
        symbols: vec!["BTC-PERP".to_string()],
        poll_interval: Duration::from_secs(30),
        fetch_timeout: Duration::from_secs(5),
        thresholds: Thresholds {
            absolute: 0.001,
            difference: 0.0005,
        },
    }
}

fn sample(exchange: &str, rate: f64, ts: i64) -> RateSample {
    RateSample {
        exchange: exchange.to_string(),
        symbol: "BTC-PERP".to_string(),
        funding_rate: rate,
        sampled_at: DateTime::<Utc>::from_timestamp(ts, 0).unwrap(),
        price: None,
        raw: None,
    }
}

fn monitor_with(
    adapters: Vec<Arc<dyn ExchangeAdapter>>,
    pool: &AnyPool,
) -> (Monitor, RateBoard, Arc<dyn SampleRepository>, Counters) {
    let board = RateBoard::new();
    let history: Arc<dyn SampleRepository> =
        Arc::new(SqlxSampleRepository::new(Arc::new(pool.clone())));
    let counters = Counters::default();

    let monitor = Monitor::new(
        adapters,
        board.clone(),
        Arc::clone(&history),
        &test_config(),
        counters.clone(),
    );

    (monitor, board, history, counters)
}

#[tokio::test]
async fn divergent_rates_fire_one_spread_alert_and_shape_stats() {
    let pool = setup_db().await;
    let ts = now_secs();

    let lighter = ScriptedExchange::new(
        "Lighter",
        vec![Ok(vec![sample("Lighter", 0.0012, ts)])],
    );
    let standx = ScriptedExchange::new(
        "StandX",
        vec![Ok(vec![sample("StandX", 0.0003, ts)])],
    );

    let (monitor, board, history, counters) = monitor_with(vec![lighter, standx], &pool);

    monitor.tick().await;

    // exactly one spread alert for the single unordered pair
    assert_eq!(counters.alerts_spread.load(Ordering::Relaxed), 1);
    // 0.0012 also crosses the absolute threshold; 0.0003 does not
    assert_eq!(counters.alerts_absolute.load(Ordering::Relaxed), 1);
    assert_eq!(counters.alerts_flip.load(Ordering::Relaxed), 0);

    let entries = board.entries_for("BTC-PERP").await;
    assert_eq!(entries.len(), 2);

    let stats = history.rolling_spread("BTC-PERP", 86_400).await.unwrap();
    let expected = (0.0012_f64 - 0.0003).abs() * 24.0 * 365.0 * 100.0;
    assert!((stats.avg_spread_apr - expected).abs() < 1e-9);
}

#[tokio::test]
async fn failed_exchange_leaves_prior_entry_untouched() {
    let pool = setup_db().await;
    let ts = now_secs() - 60;

    let lighter = ScriptedExchange::new(
        "Lighter",
        vec![
            Ok(vec![sample("Lighter", 0.0002, ts)]),
            Err(ExchangeError::InvalidResponse("venue down")),
        ],
    );
    let standx = ScriptedExchange::new(
        "StandX",
        vec![
            Ok(vec![sample("StandX", 0.0001, ts)]),
            Ok(vec![sample("StandX", 0.0004, ts + 30)]),
        ],
    );

    let (monitor, board, _history, counters) = monitor_with(vec![lighter, standx], &pool);

    monitor.tick().await;
    monitor.tick().await;

    assert_eq!(counters.ticks.load(Ordering::Relaxed), 2);
    assert_eq!(counters.fetch_failures.load(Ordering::Relaxed), 1);

    // StandX advanced, Lighter still shows the tick-1 observation
    let lighter_entry = board.get("BTC-PERP", "Lighter").await.unwrap();
    assert_eq!(lighter_entry.timestamp_secs(), ts);
    assert_eq!(lighter_entry.funding_rate, 0.0002);

    let standx_entry = board.get("BTC-PERP", "StandX").await.unwrap();
    assert_eq!(standx_entry.timestamp_secs(), ts + 30);
}

#[tokio::test]
async fn hung_exchange_times_out_without_stalling_the_tick() {
    let pool = setup_db().await;
    // Set up the real database connection before taking control of the
    // clock: sqlx's pool acquire runs on a blocking thread, and a clock
    // paused from the start of the test auto-advances its acquire timeout
    // to expiry before that I/O completes. Pause only once setup is done
    // so the fetch timeout below still elapses virtually and instantly.
    tokio::time::pause();
    let ts = now_secs();

    let standx = ScriptedExchange::new(
        "StandX",
        vec![Ok(vec![sample("StandX", 0.0001, ts)])],
    );
    let hung: Arc<dyn ExchangeAdapter> = Arc::new(HungExchange);

    let (monitor, board, _history, counters) = monitor_with(vec![hung, standx], &pool);

    monitor.tick().await;

    assert_eq!(counters.fetch_failures.load(Ordering::Relaxed), 1);
    assert!(board.get("BTC-PERP", "StandX").await.is_some());
}

#[tokio::test]
async fn flip_alert_fires_once_per_strict_sign_change() {
    let pool = setup_db().await;
    let ts = now_secs() - 300;

    let lighter = ScriptedExchange::new(
        "Lighter",
        vec![
            Ok(vec![sample("Lighter", 0.0002, ts)]),
            Ok(vec![sample("Lighter", -0.0001, ts + 30)]),
            Ok(vec![sample("Lighter", 0.0, ts + 60)]),
            Ok(vec![sample("Lighter", 0.0003, ts + 90)]),
        ],
    );

    let (monitor, _board, _history, counters) = monitor_with(vec![lighter], &pool);

    for _ in 0..4 {
        monitor.tick().await;
    }

    // only the +0.0002 -> -0.0001 transition is a flip; passing through
    // exactly zero is not
    assert_eq!(counters.alerts_flip.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn samples_are_persisted_before_the_board_reflects_them() {
    let pool = setup_db().await;
    let ts = now_secs();

    let lighter = ScriptedExchange::new(
        "Lighter",
        vec![Ok(vec![sample("Lighter", 0.0002, ts)])],
    );

    let (monitor, board, _history, _counters) = monitor_with(vec![lighter], &pool);

    monitor.tick().await;

    // every board entry must be corroborated by a history row
    assert!(board.get("BTC-PERP", "Lighter").await.is_some());

    let n: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM funding_history WHERE exchange = 'Lighter' AND timestamp = ?",
    )
    .bind(ts)
    .fetch_one(&pool)
    .await
    .unwrap()
    .get("n");
    assert_eq!(n, 1);
}
