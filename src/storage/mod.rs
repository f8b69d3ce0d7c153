//! SQLite persistence — fingerprint dedup state and drift history.
//!
//! WAL-mode SQLite at `{data_dir}/driftd.db`. The fingerprint table backs
//! [`SqliteFingerprintStore`] so at-most-once reporting survives daemon
//! restarts; `drift_history` keeps an append-only record of everything the
//! daemon ever reported.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};

use crate::engine::store::{FingerprintStore, StoreError};
use crate::model::DriftRecord;

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled. `slow_query_ms` is
    /// the threshold in milliseconds; 0 disables it.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("driftd.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            use sqlx::ConnectOptions as _;
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Idempotent schema creation.
    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS fingerprints (\
                 fingerprint TEXT PRIMARY KEY, \
                 first_seen TEXT NOT NULL, \
                 last_seen TEXT NOT NULL\
             )",
        )
        .execute(pool)
        .await
        .context("failed to create fingerprints table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS drift_history (\
                 fingerprint TEXT NOT NULL, \
                 resource_type TEXT NOT NULL, \
                 resource_id TEXT NOT NULL, \
                 domain TEXT NOT NULL, \
                 field_path TEXT NOT NULL, \
                 severity TEXT NOT NULL, \
                 expected_value TEXT NOT NULL, \
                 actual_value TEXT NOT NULL, \
                 detected_at TEXT NOT NULL\
             )",
        )
        .execute(pool)
        .await
        .context("failed to create drift_history table")?;

        Ok(())
    }

    /// Verify the database answers a trivial query (health check).
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Append one reported drift to the history table.
    pub async fn record_drift(&self, record: &DriftRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO drift_history \
             (fingerprint, resource_type, resource_id, domain, field_path, severity, \
              expected_value, actual_value, detected_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.fingerprint)
        .bind(&record.resource_type)
        .bind(&record.resource_id)
        .bind(record.domain.as_str())
        .bind(&record.field_path)
        .bind(record.severity.as_str())
        .bind(record.expected_value.to_string())
        .bind(record.actual_value.to_string())
        .bind(record.detected_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Total drifts ever reported.
    pub async fn drift_history_count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM drift_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

/// Persistent fingerprint store with TTL-based re-reporting.
///
/// Suppressed hits do not refresh `last_seen` — a drift that persists past
/// the retention window is reported again, once per window.
pub struct SqliteFingerprintStore {
    pool: SqlitePool,
    retention_secs: u64,
}

impl SqliteFingerprintStore {
    pub fn new(pool: SqlitePool, retention_secs: u64) -> Self {
        Self {
            pool,
            retention_secs,
        }
    }
}

#[async_trait]
impl FingerprintStore for SqliteFingerprintStore {
    async fn check_and_record(
        &self,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT last_seen FROM fingerprints WHERE fingerprint = ?")
                .bind(fingerprint)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;

        match row {
            None => {
                let ts = now.to_rfc3339();
                sqlx::query(
                    "INSERT INTO fingerprints (fingerprint, first_seen, last_seen) \
                     VALUES (?, ?, ?)",
                )
                .bind(fingerprint)
                .bind(&ts)
                .bind(&ts)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
                Ok(true)
            }
            Some((last_seen,)) => {
                let last_seen = DateTime::parse_from_rfc3339(&last_seen)
                    .map_err(|e| StoreError::Database(format!("bad last_seen timestamp: {e}")))?
                    .with_timezone(&Utc);

                let expired = self.retention_secs > 0
                    && now - last_seen >= Duration::seconds(self.retention_secs as i64);
                if !expired {
                    return Ok(false);
                }

                sqlx::query("UPDATE fingerprints SET last_seen = ? WHERE fingerprint = ?")
                    .bind(now.to_rfc3339())
                    .bind(fingerprint)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                Ok(true)
            }
        }
    }
}
