//! Spaced repetition reminders.
//!
//! Each item walks through up to four configured intervals. Completing an
//! item moves it to the next positive interval, counted from the completion
//! time; when there is none the schedule is exhausted and stays that way.

use std::sync::Arc;

use chrono::{DateTime, Days, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock, from_timestamp, whole_seconds};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    INTERVAL_SLOTS, NewRepetition, ReminderIntervals, RepetitionItem, RepetitionPatch,
    ScheduleState,
};

/// Index stored once no further interval is configured.
pub const EXHAUSTED_INDEX: i32 = -1;

/// Scheduling columns derived from the intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub current_interval_index: i32,
    pub next_reminder_date: Option<DateTime<Utc>>,
}

/// Schedule of a freshly created item.
pub fn initial_schedule(
    intervals: &ReminderIntervals,
    created_at: DateTime<Utc>,
) -> Result<Schedule> {
    let next_reminder_date = match intervals.days_at(0) {
        Some(days) => Some(add_days(created_at, days)?),
        None => None,
    };
    Ok(Schedule {
        current_interval_index: 0,
        next_reminder_date,
    })
}

/// Schedule after a completion at `now` from `state`.
pub fn advance(
    intervals: &ReminderIntervals,
    state: ScheduleState,
    now: DateTime<Utc>,
) -> Result<Schedule> {
    let exhausted = Schedule {
        current_interval_index: EXHAUSTED_INDEX,
        next_reminder_date: None,
    };

    let ScheduleState::Scheduled(current) = state else {
        return Ok(exhausted);
    };

    let next = current + 1;
    if next >= INTERVAL_SLOTS {
        return Ok(exhausted);
    }
    match intervals.days_at(next) {
        Some(days) => Ok(Schedule {
            current_interval_index: i32::try_from(next)
                .map_err(|_| Error::Other(format!("interval index {next} out of range")))?,
            next_reminder_date: Some(add_days(now, days)?),
        }),
        None => Ok(exhausted),
    }
}

/// Calendar-day addition on the full instant (no midnight alignment).
fn add_days(at: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    u64::try_from(days)
        .ok()
        .and_then(|days| at.checked_add_days(Days::new(days)))
        .ok_or_else(|| Error::Validation(format!("cannot add {days} days to {at}")))
}

/// Owns repetition items and their reminder lifecycle.
#[derive(Clone)]
pub struct RepetitionScheduler {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl RepetitionScheduler {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn now(&self) -> DateTime<Utc> {
        whole_seconds(self.clock.now())
    }

    /// Create an item scheduled from now.
    ///
    /// All-empty intervals are accepted and produce an item with no reminder.
    pub async fn create(&self, new: NewRepetition) -> Result<RepetitionItem> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("name must not be empty".to_string()));
        }
        new.reminder_intervals.validate()?;

        let created_at = self.now();
        let schedule = initial_schedule(&new.reminder_intervals, created_at)?;
        let item = RepetitionItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            content: new.content,
            created_at,
            reminder_intervals: new.reminder_intervals,
            current_interval_index: schedule.current_interval_index,
            next_reminder_date: schedule.next_reminder_date,
            last_completed_at: None,
            is_muted: false,
        };

        let [i1, i2, i3, i4] = item.reminder_intervals.0;
        sqlx::query(
            r#"
            INSERT INTO repetitions (id, name, content, created_at, reminder_interval_1, reminder_interval_2, reminder_interval_3, reminder_interval_4, current_interval_index, next_reminder_date, last_completed_at, is_muted)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 0)
            "#,
        )
        .bind(item.id.to_string())
        .bind(&item.name)
        .bind(&item.content)
        .bind(item.created_at.timestamp())
        .bind(i1)
        .bind(i2)
        .bind(i3)
        .bind(i4)
        .bind(item.current_interval_index)
        .bind(item.next_reminder_date.map(|dt| dt.timestamp()))
        .execute(self.db.pool())
        .await?;

        tracing::debug!(id = %item.id, name = %item.name, "Created repetition item");
        Ok(item)
    }

    /// All items, soonest reminder first.
    ///
    /// Items without a reminder date sort before scheduled ones (SQLite puts
    /// NULL first in ascending order); ties go to the newest item.
    pub async fn list_all(&self) -> Result<Vec<RepetitionItem>> {
        let rows =
            sqlx::query("SELECT * FROM repetitions ORDER BY next_reminder_date ASC, created_at DESC")
                .fetch_all(self.db.pool())
                .await?;

        rows.iter().map(repetition_from_row).collect()
    }

    /// Unmuted items whose reminder is due at or before `at`.
    pub async fn list_due(&self, at: DateTime<Utc>) -> Result<Vec<RepetitionItem>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM repetitions
            WHERE is_muted = 0
              AND next_reminder_date IS NOT NULL
              AND next_reminder_date <= ?
            ORDER BY next_reminder_date ASC, created_at DESC
            "#,
        )
        .bind(at.timestamp())
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(repetition_from_row).collect()
    }

    /// Get an item by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<RepetitionItem>> {
        let row = sqlx::query("SELECT * FROM repetitions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(repetition_from_row).transpose()
    }

    /// Delete an item. Returns the number of rows removed (0 or 1).
    pub async fn delete(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM repetitions WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Mute or unmute reminders. The schedule itself is left alone.
    pub async fn set_muted(&self, id: Uuid, muted: bool) -> Result<RepetitionItem> {
        let result = sqlx::query("UPDATE repetitions SET is_muted = ? WHERE id = ?")
            .bind(i64::from(muted))
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        self.get_by_id(id).await?.ok_or_else(|| not_found(id))
    }

    /// Record a review and move to the next interval.
    pub async fn complete(&self, id: Uuid) -> Result<RepetitionItem> {
        let now = self.now();
        let mut tx = self.db.begin_write().await?;

        let row = sqlx::query("SELECT * FROM repetitions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            tx.rollback().await?;
            return Err(not_found(id));
        };
        let mut item = repetition_from_row(&row)?;

        let schedule = advance(&item.reminder_intervals, item.state(), now)?;
        sqlx::query(
            r#"
            UPDATE repetitions
            SET current_interval_index = ?, next_reminder_date = ?, last_completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(schedule.current_interval_index)
        .bind(schedule.next_reminder_date.map(|dt| dt.timestamp()))
        .bind(now.timestamp())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        item.current_interval_index = schedule.current_interval_index;
        item.next_reminder_date = schedule.next_reminder_date;
        item.last_completed_at = Some(now);

        tracing::debug!(
            id = %id,
            index = item.current_interval_index,
            next = ?item.next_reminder_date,
            "Completed repetition item"
        );
        Ok(item)
    }

    /// Apply a partial update to the writable fields.
    ///
    /// Interval edits do not reschedule the item. An empty patch returns the
    /// stored item unchanged.
    pub async fn update(&self, id: Uuid, patch: RepetitionPatch) -> Result<RepetitionItem> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(Error::Validation("name must not be empty".to_string()));
            }
        }
        let intervals = patch.intervals();
        for (slot, value) in intervals.iter().enumerate() {
            if let Some(Some(days)) = value {
                if *days < 0 {
                    return Err(Error::Validation(format!(
                        "reminder interval {} must not be negative (got {days})",
                        slot + 1
                    )));
                }
            }
        }

        if patch.is_empty() {
            return self.get_by_id(id).await?.ok_or_else(|| not_found(id));
        }

        let mut sql = String::from("UPDATE repetitions SET ");
        let mut assignments = Vec::new();
        if patch.name.is_some() {
            assignments.push("name = ?".to_string());
        }
        if patch.content.is_some() {
            assignments.push("content = ?".to_string());
        }
        for (slot, value) in intervals.iter().enumerate() {
            if value.is_some() {
                assignments.push(format!("reminder_interval_{} = ?", slot + 1));
            }
        }
        if patch.is_muted.is_some() {
            assignments.push("is_muted = ?".to_string());
        }
        sql.push_str(&assignments.join(", "));
        sql.push_str(" WHERE id = ?");

        let mut query = sqlx::query(&sql);
        if let Some(name) = &patch.name {
            query = query.bind(name.trim().to_string());
        }
        if let Some(content) = &patch.content {
            query = query.bind(content.clone());
        }
        for value in intervals.into_iter().flatten() {
            query = query.bind(value);
        }
        if let Some(muted) = patch.is_muted {
            query = query.bind(i64::from(muted));
        }
        query = query.bind(id.to_string());

        let result = query.execute(self.db.pool()).await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }

        tracing::debug!(id = %id, fields = assignments.len(), "Updated repetition item");
        self.get_by_id(id).await?.ok_or_else(|| not_found(id))
    }
}

fn not_found(id: Uuid) -> Error {
    Error::NotFound(format!("repetition item '{id}'"))
}

fn repetition_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<RepetitionItem> {
    let id: String = row.get("id");
    Ok(RepetitionItem {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Other(format!("invalid repetition id '{id}': {e}")))?,
        name: row.get("name"),
        content: row.get("content"),
        created_at: from_timestamp(row.get::<i64, _>("created_at")),
        reminder_intervals: ReminderIntervals::new([
            row.get("reminder_interval_1"),
            row.get("reminder_interval_2"),
            row.get("reminder_interval_3"),
            row.get("reminder_interval_4"),
        ]),
        current_interval_index: row.get("current_interval_index"),
        next_reminder_date: row
            .get::<Option<i64>, _>("next_reminder_date")
            .map(from_timestamp),
        last_completed_at: row
            .get::<Option<i64>, _>("last_completed_at")
            .map(from_timestamp),
        is_muted: row.get::<i64, _>("is_muted") != 0,
    })
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
