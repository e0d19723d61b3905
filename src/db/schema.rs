use sqlx::AnyPool;

/// Append-only funding sample log. The `(symbol, timestamp)` index backs
/// every dashboard query; other tooling may rely on this table shape.
pub async fn migrate(pool: &AnyPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS funding_history (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  exchange TEXT NOT NULL,
  symbol TEXT NOT NULL,
  funding_rate REAL,
  price REAL,
  timestamp BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_symbol_timestamp ON funding_history (symbol, timestamp);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
