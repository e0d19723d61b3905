//! Polling scheduler.
//!
//! Each tick fans one fetch out per exchange, merges whatever subset came
//! back into the board, appends every sample to history, and evaluates
//! the alert rules. One venue failing, hanging, or returning nothing
//! never costs the others their round.
//!
//! Data flow per tick:
//! adapters -> SampleRepository + RateBoard -> alert pass -> sleep

pub mod alerts;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{info, warn};

use crate::board::RateBoard;
use crate::config::{AppConfig, Thresholds};
use crate::exchange::ExchangeAdapter;
use crate::exchange::types::RateSample;
use crate::history::repository::SampleRepository;
use crate::logger::warn_if_slow;
use crate::metrics::counters::Counters;

pub struct Monitor {
    adapters: Vec<Arc<dyn ExchangeAdapter>>,
    board: RateBoard,
    history: Arc<dyn SampleRepository>,
    symbols: Vec<String>,
    poll_interval: Duration,
    fetch_timeout: Duration,
    thresholds: Thresholds,
    counters: Counters,
}

impl Monitor {
    pub fn new(
        adapters: Vec<Arc<dyn ExchangeAdapter>>,
        board: RateBoard,
        history: Arc<dyn SampleRepository>,
        cfg: &AppConfig,
        counters: Counters,
    ) -> Self {
        Self {
            adapters,
            board,
            history,
            symbols: cfg.symbols.clone(),
            poll_interval: cfg.poll_interval,
            fetch_timeout: cfg.fetch_timeout,
            thresholds: cfg.thresholds,
            counters,
        }
    }

    /// Runs the polling loop until the shutdown channel fires. An
    /// in-flight tick always completes before the signal is observed.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            every_secs = self.poll_interval.as_secs(),
            symbols = ?self.symbols,
            exchanges = self.adapters.len(),
            "funding monitor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.recv() => {
                    info!("funding monitor stopping");
                    return Ok(());
                }
            }
        }
    }

    /// One polling round. Public so tests can drive rounds directly.
    pub async fn tick(&self) {
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);

        let mut fetches = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let symbols = self.symbols.clone();
            let budget = self.fetch_timeout;
            let counters = self.counters.clone();

            fetches.push(async move {
                let fetch = warn_if_slow("exchange_fetch", budget / 2, adapter.fetch(&symbols));
                match timeout(budget, fetch).await {
                    Ok(Ok(samples)) => samples,
                    Ok(Err(e)) => {
                        counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            exchange = adapter.name(),
                            error = %e,
                            "exchange fetch failed, zero samples this tick"
                        );
                        Vec::new()
                    }
                    Err(_) => {
                        counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            exchange = adapter.name(),
                            timeout_ms = budget.as_millis() as u64,
                            "exchange fetch timed out, zero samples this tick"
                        );
                        Vec::new()
                    }
                }
            });
        }

        // All adapters are awaited jointly; the merge phase never overlaps
        // the next tick's fetches.
        let results = futures::future::join_all(fetches).await;

        let mut merged = 0_u64;
        for samples in results {
            for sample in samples {
                self.process_sample(sample).await;
                merged += 1;
            }
        }

        self.spread_pass().await;

        info!(
            samples = merged,
            total_ingested = self.counters.samples_ingested.load(Ordering::Relaxed),
            fetch_failures = self.counters.fetch_failures.load(Ordering::Relaxed),
            "tick complete"
        );
    }

    async fn process_sample(&self, sample: RateSample) {
        // History first: a restart must never show a board entry the log
        // does not corroborate.
        self.history.append(&sample).await;

        let previous = self.board.get(&sample.symbol, &sample.exchange).await;
        self.board.set(sample.clone()).await;
        self.counters.samples_ingested.fetch_add(1, Ordering::Relaxed);

        info!(
            exchange = %sample.exchange,
            symbol = %sample.symbol,
            rate = sample.funding_rate,
            price = sample.price,
            "funding sample merged"
        );

        if let Some(alert) = alerts::absolute_rate(&sample, self.thresholds.absolute) {
            self.counters.alerts_absolute.fetch_add(1, Ordering::Relaxed);
            alerts::emit(&alert);
        }
        if let Some(alert) = alerts::flip(previous.as_ref(), &sample) {
            self.counters.alerts_flip.fetch_add(1, Ordering::Relaxed);
            alerts::emit(&alert);
        }
    }

    /// Cross-exchange comparison over the fully merged board, once per
    /// tick per symbol with at least two venue entries.
    async fn spread_pass(&self) {
        for symbol in &self.symbols {
            let entries = self.board.entries_for(symbol).await;
            if entries.len() < 2 {
                continue;
            }

            for alert in alerts::spreads(symbol, &entries, self.thresholds.difference) {
                self.counters.alerts_spread.fetch_add(1, Ordering::Relaxed);
                alerts::emit(&alert);
            }
        }
    }
}
