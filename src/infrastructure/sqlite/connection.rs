use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::models::DatabaseConfig;

/// Database connection pool manager
///
/// Manages the `SQLite` connection pool with WAL mode enabled for better
/// concurrency, and owns the embedded schema.
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Create a new database connection pool with WAL mode enabled
    ///
    /// # Configuration
    /// - Journal mode: WAL (Write-Ahead Logging)
    /// - Synchronous: NORMAL (good balance of safety and performance)
    /// - Foreign keys: Enabled
    /// - Busy timeout: 5 seconds
    /// - Acquire timeout: 10 seconds
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("invalid database URL")?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(Duration::from_secs(30))
            .max_lifetime(Duration::from_secs(1800))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .context("failed to create connection pool")?;

        Ok(Self { pool })
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::new(&format!("sqlite:{}", config.path), config.max_connections).await
    }

    /// Create the schema if it does not exist. Safe to call repeatedly.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS contracts (
                contract_id TEXT PRIMARY KEY,
                plain_text TEXT NOT NULL,
                html TEXT,
                package_ref TEXT,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("failed to create contracts table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS draft_snapshots (
                contract_id TEXT NOT NULL,
                draft_key TEXT NOT NULL,
                html TEXT,
                plain_text TEXT NOT NULL,
                summary TEXT,
                applied_changes TEXT NOT NULL,
                asset_ref TEXT,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                matched_count INTEGER NOT NULL,
                unmatched_count INTEGER NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (contract_id, draft_key)
            )",
        )
        .execute(&self.pool)
        .await
        .context("failed to create draft_snapshots table")?;

        Ok(())
    }

    /// Get a reference to the connection pool
    ///
    /// Use this to pass the pool to repository implementations.
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_pool_creation() {
        let db = DatabaseConnection::new("sqlite::memory:", 5)
            .await
            .expect("failed to create database connection");

        assert!(!db.pool().is_closed());
        db.close().await;
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let db = DatabaseConnection::new("sqlite::memory:", 5)
            .await
            .expect("failed to create database connection");

        db.init_schema().await.expect("failed to create schema");
        db.init_schema().await.expect("second run should be a no-op");

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("failed to query tables");

        let names: Vec<String> = tables.into_iter().map(|t| t.0).collect();
        assert!(names.contains(&"contracts".to_string()));
        assert!(names.contains(&"draft_snapshots".to_string()));

        db.close().await;
    }
}
