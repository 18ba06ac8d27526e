mod error;
mod objects;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use error::StorageError;
pub use objects::DocumentStorage;

pub trait RateLimitRepository: Send + Sync {
    /// Records a hit for `client_id` at `now` unless it already has `max_hits`
    /// hits newer than `cutoff`. Returns whether the hit was accepted.
    async fn record_hit(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
        max_hits: usize,
    ) -> Result<bool, StorageError>;

    /// Drops hits at or before `cutoff`; returns how many clients were evicted.
    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}

#[derive(Clone, Default)]
pub struct MemoryRateLimitStore {
    hits: Arc<Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked_clients(&self) -> usize {
        self.hits.lock().len()
    }
}

fn prune(queue: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
    while let Some(front) = queue.front() {
        if *front <= cutoff {
            queue.pop_front();
        } else {
            break;
        }
    }
}

impl RateLimitRepository for MemoryRateLimitStore {
    async fn record_hit(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
        max_hits: usize,
    ) -> Result<bool, StorageError> {
        let mut guard = self.hits.lock();
        let queue = guard.entry(client_id.to_string()).or_default();
        prune(queue, cutoff);

        if queue.len() >= max_hits {
            return Ok(false);
        }

        queue.push_back(now);
        Ok(true)
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut removed = 0_u64;
        self.hits.lock().retain(|_, queue| {
            prune(queue, cutoff);
            let keep = !queue.is_empty();
            if !keep {
                removed += 1;
            }
            keep
        });

        Ok(removed)
    }
}

/// Shared limiter state for multi-instance deployments.
#[derive(Clone)]
pub struct SqliteRateLimitStore {
    pool: SqlitePool,
}

impl SqliteRateLimitStore {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        // Every connection to `:memory:` is a separate database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rate_limit_hits (
              client_id TEXT NOT NULL,
              hit_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_rate_limit_hits_client
            ON rate_limit_hits (client_id, hit_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Fixed-width so that string comparison in SQL orders chronologically.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl RateLimitRepository for SqliteRateLimitStore {
    async fn record_hit(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
        max_hits: usize,
    ) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM rate_limit_hits WHERE client_id = ?1 AND hit_at <= ?2")
            .bind(client_id)
            .bind(timestamp(cutoff))
            .execute(&mut *tx)
            .await?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM rate_limit_hits WHERE client_id = ?1")
                .bind(client_id)
                .fetch_one(&mut *tx)
                .await?;

        if count as usize >= max_hits {
            tx.commit().await?;
            return Ok(false);
        }

        sqlx::query("INSERT INTO rate_limit_hits (client_id, hit_at) VALUES (?1, ?2)")
            .bind(client_id)
            .bind(timestamp(now))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let before: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT client_id) FROM rate_limit_hits")
            .fetch_one(&self.pool)
            .await?;

        sqlx::query("DELETE FROM rate_limit_hits WHERE hit_at <= ?1")
            .bind(timestamp(cutoff))
            .execute(&self.pool)
            .await?;

        let after: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT client_id) FROM rate_limit_hits")
            .fetch_one(&self.pool)
            .await?;

        Ok((before - after).max(0) as u64)
    }
}

#[derive(Clone)]
pub enum RateLimitStore {
    Memory(MemoryRateLimitStore),
    Sqlite(SqliteRateLimitStore),
}

impl RateLimitStore {
    pub fn memory() -> Self {
        Self::Memory(MemoryRateLimitStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self, StorageError> {
        let sqlite = SqliteRateLimitStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            RateLimitStore::Memory(_) => "memory",
            RateLimitStore::Sqlite(_) => "sqlite",
        }
    }
}

impl RateLimitRepository for RateLimitStore {
    async fn record_hit(
        &self,
        client_id: &str,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
        max_hits: usize,
    ) -> Result<bool, StorageError> {
        match self {
            RateLimitStore::Memory(store) => {
                store.record_hit(client_id, now, cutoff, max_hits).await
            }
            RateLimitStore::Sqlite(store) => {
                store.record_hit(client_id, now, cutoff, max_hits).await
            }
        }
    }

    async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        match self {
            RateLimitStore::Memory(store) => store.purge_expired(cutoff).await,
            RateLimitStore::Sqlite(store) => store.purge_expired(cutoff).await,
        }
    }
}
