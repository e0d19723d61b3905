use std::str::FromStr;
use std::time::Duration;

/// Alert trigger levels, expressed as per-funding-interval fractions
/// (0.001 = 0.1%).
#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    /// A single exchange's rate at or above this magnitude fires an alert.
    pub absolute: f64,

    /// A cross-exchange rate difference at or above this fires an alert.
    pub difference: f64,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Bind address for the dashboard HTTP server.
    pub http_listen_addr: String,

    // =========================
    // Polling configuration
    // =========================
    /// Symbols requested from every exchange each tick.
    pub symbols: Vec<String>,

    /// Delay between polling rounds.
    ///
    /// Measured from the start of a tick; a tick that runs long simply
    /// pushes the next one out. There is no catch-up of missed ticks.
    pub poll_interval: Duration,

    /// Upper bound on a single exchange fetch.
    ///
    /// Every adapter call is wrapped in its own timeout so one hung
    /// exchange cannot stall the whole round. A timed-out exchange
    /// contributes zero samples for that tick.
    pub fetch_timeout: Duration,

    pub thresholds: Thresholds,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://funding_data.db".to_string());

        Self {
            database_url,
            http_listen_addr: std::env::var("FW_LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),

            symbols: std::env::var("FW_SYMBOLS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| vec!["BTC-PERP".to_string(), "ETH-PERP".to_string()]),

            poll_interval: Duration::from_secs(env_or("FW_POLL_INTERVAL_SECS", 30)),
            fetch_timeout: Duration::from_secs(env_or("FW_FETCH_TIMEOUT_SECS", 20)),

            thresholds: Thresholds {
                absolute: env_or("FW_THRESHOLD_ABSOLUTE", 0.001),
                difference: env_or("FW_THRESHOLD_DIFFERENCE", 0.0005),
            },
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
