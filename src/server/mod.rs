//! Dashboard HTTP server.
//!
//! Thin read-only surface over the board and the sample store; owns no
//! business logic and never blocks the polling loop. Aggregate-query
//! failures degrade to empty/zero bodies with an error status instead of
//! surfacing as faults.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::board::RateBoard;
use crate::history::model::{HeatmapCell, HistoryRow, ROLLING_WINDOW_SECS, SpreadStats};
use crate::history::repository::SampleRepository;

const DEFAULT_SYMBOL: &str = "BTC-PERP";
const DEFAULT_HISTORY_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct AppState {
    pub board: RateBoard,
    pub history: Arc<dyn SampleRepository>,
    /// Configured symbol set; every one appears in `/api/data`, with or
    /// without board entries yet.
    pub symbols: Vec<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/data", get(data))
        .route("/api/history", get(history))
        .route("/api/heatmap", get(heatmap))
        .with_state(state)
}

pub async fn run(
    listen_addr: String,
    state: AppState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;

    info!(address = %listen_addr, "dashboard server started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    Ok(())
}

/// Latest board entries per configured symbol, each with rolling 24h
/// spread stats.
async fn data(State(state): State<AppState>) -> Json<Value> {
    let mut body = serde_json::Map::new();

    for symbol in &state.symbols {
        let entries = state.board.entries_for(symbol).await;

        let mut per_symbol = serde_json::Map::new();
        for (exchange, sample) in &entries {
            per_symbol.insert(
                exchange.clone(),
                serde_json::to_value(sample).unwrap_or(Value::Null),
            );
        }

        let stats = match state.history.rolling_spread(symbol, ROLLING_WINDOW_SECS).await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, symbol = %symbol, "rolling spread query failed");
                SpreadStats::default()
            }
        };
        per_symbol.insert(
            "stats".to_string(),
            serde_json::to_value(stats).unwrap_or(Value::Null),
        );

        body.insert(symbol.clone(), Value::Object(per_symbol));
    }

    Json(Value::Object(body))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    symbol: Option<String>,
    // kept as a string so a malformed value falls back to the default
    // instead of rejecting the request
    limit: Option<String>,
}

async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let symbol = query
        .symbol
        .unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
    let limit = query
        .limit
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_HISTORY_LIMIT);

    match state.history.history(&symbol, limit).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            error!(error = %e, symbol = %symbol, "history query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Vec::<HistoryRow>::new()),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct HeatmapQuery {
    symbol: Option<String>,
}

async fn heatmap(
    State(state): State<AppState>,
    Query(query): Query<HeatmapQuery>,
) -> Response {
    let symbol = query
        .symbol
        .unwrap_or_else(|| DEFAULT_SYMBOL.to_string());

    match state.history.heatmap(&symbol).await {
        Ok(cells) => Json(cells).into_response(),
        Err(e) => {
            error!(error = %e, symbol = %symbol, "heatmap query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Vec::<HeatmapCell>::new()),
            )
                .into_response()
        }
    }
}
