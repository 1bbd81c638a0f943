use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Open (creating if missing) the SQLite database backing the response
/// cache and make sure the cache table exists.
///
/// In-memory databases live only as long as their connection, so they are
/// pinned to a single connection that is never recycled.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool_options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(4)
    };

    let pool = pool_options.connect_with(options).await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS query_cache (
             key        TEXT PRIMARY KEY NOT NULL,
             value      TEXT NOT NULL,
             updated_at TEXT NOT NULL
         )",
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}
