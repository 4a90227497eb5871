//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::time::Duration;

use super::Database;

/// Ordered schema steps; each runs once, inside its own transaction
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "key-value table",
    r#"
    CREATE TABLE kv_store (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
)];

/// Writers from a second process wait this long for the file lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn connection_failed(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Database(DatabaseError::ConnectionFailed(format!("{}: {}", what, e)))
}

fn migration_failed(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Database(DatabaseError::MigrationFailed(format!("{}: {}", what, e)))
}

impl Database {
    /// Open (or create) the SQLite file at `path` and bring its schema up to date
    ///
    /// Missing parent directories are created. The journal runs in WAL mode.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| connection_failed("Failed to create database directory", e))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| connection_failed("Failed to connect to database", e))?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| migration_failed("Failed to create schema_version table", e))?;

        let applied: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query schema version: {}",
                    e
                )))
            })?;

        for &(version, name, ddl) in MIGRATIONS.iter().filter(|(v, _, _)| *v > applied) {
            self.apply(version, name, ddl).await?;
        }
        Ok(())
    }

    async fn apply(&self, version: i64, name: &str, ddl: &str) -> Result<()> {
        tracing::info!(version, name, "Applying database migration");

        // Dropping the transaction without commit rolls it back
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| migration_failed("Failed to begin migration", e))?;

        sqlx::query(ddl)
            .execute(&mut *tx)
            .await
            .map_err(|e| migration_failed(&format!("Migration v{} ({}) failed", version, name), e))?;

        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(|e| migration_failed("Failed to record migration", e))?;

        tx.commit()
            .await
            .map_err(|e| migration_failed(&format!("Failed to commit migration v{}", version), e))?;

        tracing::info!(version, "Database migration complete");
        Ok(())
    }

    /// Close the connection pool, waiting for in-flight queries
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// The underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
