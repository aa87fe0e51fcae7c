use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use super::DatabaseError;

/// Database connection pool manager.
///
/// Manages a SQLite pool with WAL mode enabled for concurrent readers.
pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Create a new connection pool.
    ///
    /// Journal mode WAL, synchronous NORMAL, foreign keys on, 5 second
    /// busy timeout.
    pub async fn new(database_url: &str) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| {
                DatabaseError::ConnectionPoolError(format!("Invalid database URL: {e}"))
            })?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                DatabaseError::ConnectionPoolError(format!(
                    "Failed to create connection pool: {e}"
                ))
            })?;

        Ok(Self { pool })
    }

    /// In-memory database on a single connection.
    ///
    /// SQLite gives every connection to `:memory:` its own database, so the
    /// pool must stay at one connection for the schema to be shared.
    pub async fn in_memory() -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| {
                DatabaseError::ConnectionPoolError(format!("Invalid database URL: {e}"))
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                DatabaseError::ConnectionPoolError(format!(
                    "Failed to create connection pool: {e}"
                ))
            })?;

        Ok(Self { pool })
    }

    /// Run migrations at startup. Safe to call repeatedly.
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_migration() {
        let db = DatabaseConnection::in_memory()
            .await
            .expect("failed to create connection");

        db.migrate().await.expect("failed to run migrations");

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("failed to query tables");

        let names: Vec<String> = tables.into_iter().map(|t| t.0).collect();
        for expected in [
            "requests",
            "required_reviewers",
            "decisions",
            "quorum_configs",
            "auto_approval_rules",
            "escalation_rules",
            "escalation_firings",
            "state_transitions",
            "notification_log",
        ] {
            assert!(names.contains(&expected.to_string()), "{expected} table should exist");
        }

        db.close().await;
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = DatabaseConnection::in_memory()
            .await
            .expect("failed to create connection");

        let result: (i32,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .expect("failed to check foreign keys pragma");
        assert_eq!(result.0, 1, "foreign keys should be enabled");

        db.close().await;
    }
}
