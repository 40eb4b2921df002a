//! SQLite-backed measurement sink.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use latprobe_core::Measurement;

use crate::error::SinkError;
use crate::sink::{LatencyFilter, MeasurementSink};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS measurements (
    item_id INTEGER NOT NULL,
    source_tag TEXT NOT NULL,
    elapsed_secs REAL NOT NULL,
    recorded_at TEXT NOT NULL
)";

/// How long a writer waits for the connection before giving up. Writers
/// queue behind each other on the single connection, so this must outlast
/// any burst of completions.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Measurement sink over a single SQLite connection.
///
/// The pool holds exactly one connection, so concurrent writers queue on
/// the pool instead of contending for the database file lock.
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    /// Open (or create) the database file and ensure the table exists.
    pub async fn open(path: &Path) -> Result<Self, SinkError> {
        Self::open_with_wait(path, DEFAULT_WRITE_WAIT).await
    }

    /// Like [`SqliteSink::open`] with an explicit connection wait.
    pub async fn open_with_wait(path: &Path, write_wait: Duration) -> Result<Self, SinkError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = Self::single_connection_pool(write_wait).connect_with(options).await?;
        info!("Measurement sink: sqlite at {}", path.display());
        Self::init(pool).await
    }

    /// Private in-memory database, gone when the sink is dropped.
    pub async fn in_memory() -> Result<Self, SinkError> {
        Self::in_memory_with_wait(DEFAULT_WRITE_WAIT).await
    }

    pub async fn in_memory_with_wait(write_wait: Duration) -> Result<Self, SinkError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = Self::single_connection_pool(write_wait).connect_with(options).await?;
        Self::init(pool).await
    }

    fn single_connection_pool(write_wait: Duration) -> SqlitePoolOptions {
        // An idle-timeout would close the only connection and, for the
        // in-memory database, throw away every row with it.
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(write_wait)
    }

    async fn init(pool: SqlitePool) -> Result<Self, SinkError> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Every stored measurement, oldest first.
    pub async fn all(&self) -> Result<Vec<Measurement>, SinkError> {
        let rows = sqlx::query_as::<_, (i64, String, f64, DateTime<Utc>)>(
            "SELECT item_id, source_tag, elapsed_secs, recorded_at FROM measurements ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(item_id, source_tag, elapsed_secs, recorded_at)| Measurement {
                item_id,
                source_tag,
                elapsed_secs,
                recorded_at,
            })
            .collect())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MeasurementSink for SqliteSink {
    async fn record(&self, measurement: &Measurement) -> Result<(), SinkError> {
        sqlx::query(
            "INSERT INTO measurements (item_id, source_tag, elapsed_secs, recorded_at) VALUES (?, ?, ?, ?)",
        )
        .bind(measurement.item_id)
        .bind(&measurement.source_tag)
        .bind(measurement.elapsed_secs)
        .bind(measurement.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_where(&self, filter: LatencyFilter) -> Result<u64, SinkError> {
        let (sql, bound) = match filter {
            LatencyFilter::AtMost(secs) => {
                ("SELECT COUNT(*) FROM measurements WHERE elapsed_secs <= ?", secs)
            }
            LatencyFilter::Above(secs) => {
                ("SELECT COUNT(*) FROM measurements WHERE elapsed_secs > ?", secs)
            }
        };
        let count: i64 = sqlx::query_scalar(sql).bind(bound).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn total_count(&self) -> Result<u64, SinkError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM measurements")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn record_and_count_in_memory() {
        let sink = SqliteSink::in_memory().await.unwrap();
        for (i, secs) in [0.05, 0.2, 0.3, 0.45, 0.5, 1.5].into_iter().enumerate() {
            sink.record(&Measurement::new(i as i64, "pt", secs)).await.unwrap();
        }

        assert_eq!(sink.total_count().await.unwrap(), 6);
        assert_eq!(sink.count_where(LatencyFilter::AtMost(0.2)).await.unwrap(), 2);
        assert_eq!(sink.count_where(LatencyFilter::AtMost(0.3)).await.unwrap(), 3);
        assert_eq!(sink.count_where(LatencyFilter::AtMost(0.5)).await.unwrap(), 5);
        assert_eq!(sink.count_where(LatencyFilter::Above(0.5)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rows_round_trip_fields() {
        let sink = SqliteSink::in_memory().await.unwrap();
        let m = Measurement::new(987654, "uk", 0.321);
        sink.record(&m).await.unwrap();

        let all = sink.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].item_id, 987654);
        assert_eq!(all[0].source_tag, "uk");
        assert!((all[0].elapsed_secs - 0.321).abs() < 1e-12);
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("latency.db");

        let sink = SqliteSink::open(&path).await.unwrap();
        sink.record(&Measurement::new(1, "en", 0.1)).await.unwrap();
        sink.record(&Measurement::new(2, "en", 0.7)).await.unwrap();
        sink.close().await;

        let reopened = SqliteSink::open(&path).await.unwrap();
        assert_eq!(reopened.total_count().await.unwrap(), 2);
        assert_eq!(reopened.count_where(LatencyFilter::Above(0.5)).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn writers_wait_for_a_busy_connection() {
        let sink = Arc::new(SqliteSink::in_memory_with_wait(Duration::from_secs(5)).await.unwrap());

        // Queued writers wait for the held connection instead of failing.
        let held = sink.pool.acquire().await.unwrap();
        let handles: Vec<_> = (0..200)
            .map(|i| {
                let sink = sink.clone();
                tokio::spawn(async move { sink.record(&Measurement::new(i, "sv", 0.01)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(handles.iter().all(|h| !h.is_finished()), "writers ran without the connection");
        drop(held);

        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(sink.total_count().await.unwrap(), 200);
    }

    #[tokio::test]
    async fn default_wait_outlasts_the_stock_pool_timeout() {
        let sink = SqliteSink::in_memory().await.unwrap();
        assert_eq!(sink.pool.options().get_acquire_timeout(), DEFAULT_WRITE_WAIT);
        assert!(DEFAULT_WRITE_WAIT > Duration::from_secs(30));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_are_serialized() {
        let sink = Arc::new(SqliteSink::in_memory().await.unwrap());
        let handles: Vec<_> = (0..100)
            .map(|i| {
                let sink = sink.clone();
                tokio::spawn(async move { sink.record(&Measurement::new(i, "ko", 0.02)).await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(sink.total_count().await.unwrap(), 100);
    }
}
