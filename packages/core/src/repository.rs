//! SQLite-backed response cache.
//!
//! [`QueryCacheRepository`] is the [`KvStore`] the binary uses so cached
//! chain responses survive restarts. Values are stored as JSON text along
//! with the RFC 3339 time of the last write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use crate::error::QueryError;
use crate::store::KvStore;

pub struct QueryCacheRepository {
    pool: SqlitePool,
}

impl QueryCacheRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Time of the last write to `key`, if any.
    pub async fn updated_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, QueryError> {
        let row = sqlx::query("SELECT updated_at FROM query_cache WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let updated_at: String = row.try_get("updated_at")?;
        let parsed = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|err| QueryError::storage(format!("Invalid updated_at '{}': {}", updated_at, err)))?
            .with_timezone(&Utc);

        Ok(Some(parsed))
    }
}

#[async_trait]
impl KvStore for QueryCacheRepository {
    async fn get(&self, key: &str) -> Result<Option<Value>, QueryError> {
        let row = sqlx::query("SELECT value FROM query_cache WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value: String = row.try_get("value")?;
        let parsed = serde_json::from_str(&value)
            .map_err(|err| QueryError::storage(format!("Corrupt cache entry '{}': {}", key, err)))?;

        Ok(Some(parsed))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), QueryError> {
        let updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO query_cache (key, value, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value.to_string())
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
