use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{error, info};

use fundwatch::{
    board::RateBoard,
    config::AppConfig,
    db::Db,
    exchange::{ExchangeAdapter, LighterClient, StandXClient},
    history::repository::SampleRepository,
    history::repository_sqlx::SqlxSampleRepository,
    logger::init_tracing,
    metrics::counters::Counters,
    monitor::Monitor,
    server,
};

/// Connects the database, runs the idempotent migration, and wraps the
/// pool in the sample repository.
async fn init_history(cfg: &AppConfig) -> anyhow::Result<Arc<dyn SampleRepository>> {
    let db = Db::connect(&cfg.database_url).await?;
    db.migrate().await?;

    Ok(Arc::new(SqlxSampleRepository::new(db.pool.clone())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sqlx::any::install_default_drivers();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing(is_production);

    info!("starting fundwatch...");

    let cfg = AppConfig::from_env();

    let history = init_history(&cfg).await.context("history init failed")?;
    let board = RateBoard::new();
    let counters = Counters::default();

    let adapters: Vec<Arc<dyn ExchangeAdapter>> = vec![
        Arc::new(LighterClient::new().context("lighter client")?),
        Arc::new(StandXClient::new().context("standx client")?),
    ];

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let server_state = server::AppState {
        board: board.clone(),
        history: Arc::clone(&history),
        symbols: cfg.symbols.clone(),
    };
    let server_task = tokio::spawn({
        let listen_addr = cfg.http_listen_addr.clone();
        let shutdown = shutdown_tx.subscribe();
        async move {
            if let Err(e) = server::run(listen_addr, server_state, shutdown).await {
                error!(error = ?e, "dashboard server failed");
            }
        }
    });

    let monitor = Monitor::new(adapters, board, history, &cfg, counters);
    let monitor_task = tokio::spawn({
        let shutdown = shutdown_tx.subscribe();
        async move {
            if let Err(e) = monitor.run(shutdown).await {
                error!(error = ?e, "funding monitor failed");
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    let _ = shutdown_tx.send(());
    let _ = monitor_task.await;
    let _ = server_task.await;

    Ok(())
}
