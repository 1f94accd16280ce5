//! Database handle and cross-table operations for studyvault.

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::models::NotificationSettings;
use crate::schema::{INIT_NOTIFICATION_SETTINGS, SCHEMA, SCHEMA_VERSION, USER_TABLES};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Row, Sqlite, SqlitePool, Transaction};
use std::path::Path;
use std::str::FromStr;

/// Database handle for studyvault.
///
/// Cloning is cheap; every clone shares the same connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Row counts per user-data table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub file_usage: i64,
    pub repetitions: i64,
    pub questionnaire_entries: i64,
    pub learning_nodes: i64,
    pub learning_edges: i64,
}

impl Database {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        let parent = path.parent().unwrap_or(Path::new("."));
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    /// Initialize schema.
    async fn init(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        self.record_schema_version().await?;
        sqlx::raw_sql(INIT_NOTIFICATION_SETTINGS)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_schema_version(&self) -> Result<()> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)",
        )
        .bind(SCHEMA_VERSION)
        .bind("initial")
        .bind(SystemClock.now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!("Initialized schema version {SCHEMA_VERSION}");
        }
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction that takes the write lock up front.
    ///
    /// A deferred transaction that reads before writing fails with
    /// `SQLITE_BUSY` instead of waiting when another connection commits in
    /// between. `BEGIN IMMEDIATE` waits on the busy timeout instead.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Close the database.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Highest applied schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        let version: (Option<i64>,) = sqlx::query_as("SELECT MAX(version) FROM schema_migrations")
            .fetch_one(&self.pool)
            .await?;
        Ok(version.0.unwrap_or(0))
    }

    /// Row counts for the user-data tables.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        Ok(DatabaseStats {
            file_usage: self.count_rows("file_usage").await?,
            repetitions: self.count_rows("repetitions").await?,
            questionnaire_entries: self.count_rows("questionnaire_entries").await?,
            learning_nodes: self.count_rows("learning_nodes").await?,
            learning_edges: self.count_rows("learning_edges").await?,
        })
    }

    async fn count_rows(&self, table: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    // =========================================================================
    // Notification settings
    // =========================================================================

    /// Read the singleton notification settings row.
    pub async fn notification_settings(&self) -> Result<NotificationSettings> {
        let row = sqlx::query(
            "SELECT enable_daily_reminder, reminder_time FROM notification_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map_or_else(NotificationSettings::default, |row| NotificationSettings {
            enable_daily_reminder: row.get::<i64, _>("enable_daily_reminder") != 0,
            reminder_time: row.get("reminder_time"),
        }))
    }

    /// Turn the daily reminder on or off. The reminder time is not editable.
    pub async fn set_daily_reminder(&self, enabled: bool) -> Result<NotificationSettings> {
        sqlx::query(
            r#"
            INSERT INTO notification_settings (id, enable_daily_reminder)
            VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET
                enable_daily_reminder = excluded.enable_daily_reminder
            "#,
        )
        .bind(i64::from(enabled))
        .execute(&self.pool)
        .await?;

        tracing::debug!(enabled, "Updated daily reminder setting");
        self.notification_settings().await
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Delete every user-data row and restore default settings.
    ///
    /// All deletes and the settings insert share one transaction; any failure
    /// rolls the whole reset back. Compaction runs after commit and only logs
    /// on failure.
    pub async fn reset_all(&self) -> Result<()> {
        let mut tx = self.begin_write().await?;

        for table in USER_TABLES {
            let sql = format!("DELETE FROM {table}");
            match sqlx::query(&sql).execute(&mut *tx).await {
                Ok(result) => {
                    tracing::debug!(table, rows = result.rows_affected(), "Cleared table");
                }
                Err(err) => {
                    tracing::warn!("Reset failed while clearing {table}, rolling back: {err}");
                    tx.rollback().await?;
                    return Err(Error::Database(err));
                }
            }
        }

        if let Err(err) = (&mut *tx)
            .execute(sqlx::raw_sql(INIT_NOTIFICATION_SETTINGS))
            .await
        {
            tracing::warn!("Reset failed while restoring settings, rolling back: {err}");
            tx.rollback().await?;
            return Err(Error::Database(err));
        }

        tx.commit().await?;
        tracing::info!("Reset all user data");

        if let Err(err) = sqlx::raw_sql("VACUUM").execute(&self.pool).await {
            tracing::warn!("Compaction after reset failed: {err}");
        }

        Ok(())
    }
}
