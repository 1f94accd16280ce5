//! File usage statistics that follow files across renames and moves.
//!
//! The caller performs the physical file system change first and then tells
//! the rebaser where things went. Nothing here touches the file system.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;

use crate::clock::{Clock, SystemClock, from_timestamp, whole_seconds};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::UsageRecord;
use crate::paths;

/// Repeated opens inside this many minutes do not bump the access count.
pub const DEFAULT_DEBOUNCE_MINUTES: i64 = 30;

/// Keeps `file_usage` rows consistent with on-disk paths.
#[derive(Clone)]
pub struct PathRebaser {
    db: Database,
    clock: Arc<dyn Clock>,
    debounce: Duration,
}

impl PathRebaser {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            debounce: Duration::minutes(DEFAULT_DEBOUNCE_MINUTES),
        }
    }

    /// Override the access-count debounce window.
    #[must_use]
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        whole_seconds(self.clock.now())
    }

    // =========================================================================
    // Access tracking
    // =========================================================================

    /// Record that a file was opened or edited.
    ///
    /// Usage tracking is best effort: failures are logged and never returned.
    pub async fn record_access(&self, base_path: &str, relative_path: &str, file_name: &str) {
        if let Err(err) = self
            .try_record_access(base_path, relative_path, file_name)
            .await
        {
            tracing::warn!(
                base_path,
                relative_path,
                "Failed to record file access: {err}"
            );
        }
    }

    /// Fallible form of [`record_access`](Self::record_access).
    pub async fn try_record_access(
        &self,
        base_path: &str,
        relative_path: &str,
        file_name: &str,
    ) -> Result<()> {
        let base_path = paths::normalize(base_path);
        let relative_path = paths::normalize(relative_path);
        let absolute_path = paths::resolve(&base_path, &relative_path);
        let now = self.now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO file_usage (absolute_path, base_path, relative_path, file_name, last_accessed_at, last_opened_or_edited_at, access_count)
            VALUES (?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(absolute_path) DO UPDATE SET
                access_count = CASE
                    WHEN excluded.last_accessed_at - file_usage.last_accessed_at > ?
                    THEN file_usage.access_count + 1
                    ELSE file_usage.access_count
                END,
                last_accessed_at = excluded.last_accessed_at,
                last_opened_or_edited_at = excluded.last_opened_or_edited_at
            "#,
        )
        .bind(&absolute_path)
        .bind(&base_path)
        .bind(&relative_path)
        .bind(file_name)
        .bind(now)
        .bind(now)
        .bind(self.debounce.num_seconds())
        .execute(self.db.pool())
        .await?;

        tracing::trace!(absolute_path = %absolute_path, "Recorded file access");
        Ok(())
    }

    /// Most recently opened or edited files under `base_path`.
    pub async fn query_recent(&self, base_path: &str, limit: i64) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM file_usage
            WHERE base_path = ?
            ORDER BY last_opened_or_edited_at DESC
            LIMIT ?
            "#,
        )
        .bind(paths::normalize(base_path))
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(usage_from_row).collect()
    }

    /// Most frequently opened files under `base_path`.
    pub async fn query_frequent(&self, base_path: &str, limit: i64) -> Result<Vec<UsageRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM file_usage
            WHERE base_path = ?
            ORDER BY access_count DESC, last_opened_or_edited_at DESC
            LIMIT ?
            "#,
        )
        .bind(paths::normalize(base_path))
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(usage_from_row).collect()
    }

    /// Look up the record for one absolute path.
    pub async fn get_by_path(&self, absolute_path: &str) -> Result<Option<UsageRecord>> {
        let row = sqlx::query("SELECT * FROM file_usage WHERE absolute_path = ?")
            .bind(absolute_path)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(usage_from_row).transpose()
    }

    // =========================================================================
    // Relocation
    // =========================================================================

    /// Point the record for one renamed or moved file at its new location.
    ///
    /// Returns the number of rows changed; 0 means the file was never tracked.
    pub async fn rename_single_file(
        &self,
        old_absolute_path: &str,
        new_absolute_path: &str,
        new_base_path: &str,
        new_relative_path: &str,
        new_file_name: &str,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE file_usage
            SET absolute_path = ?, base_path = ?, relative_path = ?, file_name = ?, last_accessed_at = ?
            WHERE absolute_path = ?
            "#,
        )
        .bind(paths::normalize(new_absolute_path))
        .bind(paths::normalize(new_base_path))
        .bind(paths::normalize(new_relative_path))
        .bind(new_file_name)
        .bind(self.now().timestamp())
        .bind(paths::normalize(old_absolute_path))
        .execute(self.db.pool())
        .await?;

        tracing::debug!(
            from = old_absolute_path,
            to = new_absolute_path,
            rows = result.rows_affected(),
            "Renamed tracked file"
        );
        Ok(result.rows_affected())
    }

    /// Rewrite every record at or below a moved folder.
    ///
    /// Runs in one transaction: either every matching row moves or none does.
    /// Returns the number of rows rewritten.
    pub async fn rebase_subtree(
        &self,
        old_base_path: &str,
        old_folder_relative_path: &str,
        new_base_path: &str,
        new_folder_relative_path: &str,
    ) -> Result<u64> {
        let old_base_path = paths::normalize(old_base_path);
        let new_base_path = paths::normalize(new_base_path);
        let old_prefix = paths::resolve(&old_base_path, old_folder_relative_path);
        let new_prefix = paths::resolve(&new_base_path, new_folder_relative_path);
        if new_prefix != old_prefix && paths::is_within(&new_prefix, &old_prefix) {
            return Err(Error::Validation(format!(
                "cannot move '{old_prefix}' into itself ('{new_prefix}')"
            )));
        }

        let now = self.now().timestamp();
        let descendants = paths::descendant_prefix(&old_prefix);
        let mut tx = self.db.begin_write().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, absolute_path FROM file_usage
            WHERE base_path = ?
              AND (absolute_path = ? OR substr(absolute_path, 1, length(?)) = ?)
            "#,
        )
        .bind(&old_base_path)
        .bind(&old_prefix)
        .bind(&descendants)
        .bind(&descendants)
        .fetch_all(&mut *tx)
        .await?;

        let mut moved = 0u64;
        for row in &rows {
            let id: i64 = row.get("id");
            let absolute_path: String = row.get("absolute_path");
            let target = relocate(&absolute_path, &old_prefix, &new_prefix, &new_base_path);

            let result = sqlx::query(
                r#"
                UPDATE file_usage
                SET absolute_path = ?, base_path = ?, relative_path = ?, file_name = ?, last_accessed_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&target.absolute_path)
            .bind(&new_base_path)
            .bind(&target.relative_path)
            .bind(&target.file_name)
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(result) => moved += result.rows_affected(),
                Err(err) => {
                    tracing::warn!(
                        from = %absolute_path,
                        to = %target.absolute_path,
                        "Subtree rebase failed, rolling back: {err}"
                    );
                    tx.rollback().await?;
                    return Err(Error::Database(err));
                }
            }
        }

        tx.commit().await?;
        tracing::debug!(
            from = %old_prefix,
            to = %new_prefix,
            rows = moved,
            "Rebased folder subtree"
        );
        Ok(moved)
    }

    /// Drop tracking for a deleted file, or a deleted folder and everything
    /// below it. Returns the number of rows removed.
    pub async fn delete_usage(
        &self,
        base_path: &str,
        relative_path: &str,
        is_folder: bool,
    ) -> Result<u64> {
        let target = paths::resolve(base_path, relative_path);

        let result = if is_folder {
            let descendants = paths::descendant_prefix(&target);
            sqlx::query(
                r#"
                DELETE FROM file_usage
                WHERE absolute_path = ? OR substr(absolute_path, 1, length(?)) = ?
                "#,
            )
            .bind(&target)
            .bind(&descendants)
            .bind(&descendants)
            .execute(self.db.pool())
            .await?
        } else {
            sqlx::query("DELETE FROM file_usage WHERE absolute_path = ?")
                .bind(&target)
                .execute(self.db.pool())
                .await?
        };

        tracing::debug!(
            path = %target,
            is_folder,
            rows = result.rows_affected(),
            "Deleted usage records"
        );
        Ok(result.rows_affected())
    }
}

/// New location fields for one record of a moved subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocated {
    pub absolute_path: String,
    pub relative_path: String,
    pub file_name: String,
}

/// Map `absolute_path` (at or below `old_prefix`) under `new_prefix`.
pub fn relocate(
    absolute_path: &str,
    old_prefix: &str,
    new_prefix: &str,
    new_base_path: &str,
) -> Relocated {
    let suffix = absolute_path.strip_prefix(old_prefix).unwrap_or_default();
    let absolute_path = paths::join(new_prefix, suffix);
    Relocated {
        relative_path: paths::relative(new_base_path, &absolute_path),
        file_name: paths::basename(&absolute_path),
        absolute_path,
    }
}

fn usage_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<UsageRecord> {
    Ok(UsageRecord {
        id: row.get("id"),
        absolute_path: row.get("absolute_path"),
        base_path: row.get("base_path"),
        relative_path: row.get("relative_path"),
        file_name: row.get("file_name"),
        last_accessed_at: from_timestamp(row.get::<i64, _>("last_accessed_at")),
        last_opened_or_edited_at: from_timestamp(row.get::<i64, _>("last_opened_or_edited_at")),
        access_count: row.get("access_count"),
    })
}

#[cfg(test)]
#[path = "rebase_tests.rs"]
mod tests;
