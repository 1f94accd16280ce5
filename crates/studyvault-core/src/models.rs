//! Domain models for tracked files, reminders and study journaling.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Usage statistics for one file inside a workspace root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: i64,
    pub absolute_path: String,
    pub base_path: String,
    pub relative_path: String,
    pub file_name: String,
    pub last_accessed_at: DateTime<Utc>,
    pub last_opened_or_edited_at: DateTime<Utc>,
    pub access_count: i64,
}

/// Number of interval slots on a repetition item.
pub const INTERVAL_SLOTS: usize = 4;

/// Day counts between reviews. `None` or a non-positive value ends the schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderIntervals(pub [Option<i64>; INTERVAL_SLOTS]);

impl ReminderIntervals {
    pub fn new(days: [Option<i64>; INTERVAL_SLOTS]) -> Self {
        Self(days)
    }

    /// Positive day count at `index`, if any.
    pub fn days_at(&self, index: usize) -> Option<i64> {
        self.0.get(index).copied().flatten().filter(|days| *days > 0)
    }

    pub fn has_any(&self) -> bool {
        (0..INTERVAL_SLOTS).any(|i| self.days_at(i).is_some())
    }

    pub fn validate(&self) -> Result<()> {
        for (i, days) in self.0.iter().enumerate() {
            if let Some(days) = days {
                if *days < 0 {
                    return Err(Error::Validation(format!(
                        "reminder interval {} must not be negative (got {days})",
                        i + 1
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A spaced repetition item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionItem {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub reminder_intervals: ReminderIntervals,
    pub current_interval_index: i32,
    pub next_reminder_date: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub is_muted: bool,
}

/// Where an item sits in its reminder schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Scheduled(usize),
    Exhausted,
}

impl RepetitionItem {
    pub fn state(&self) -> ScheduleState {
        match (usize::try_from(self.current_interval_index), self.next_reminder_date) {
            (Ok(index), Some(_)) => ScheduleState::Scheduled(index),
            _ => ScheduleState::Exhausted,
        }
    }

    pub fn is_due(&self, at: DateTime<Utc>) -> bool {
        !self.is_muted && self.next_reminder_date.is_some_and(|due| due <= at)
    }
}

/// Input for creating a repetition item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRepetition {
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub reminder_intervals: ReminderIntervals,
}

/// Partial update. Only these fields are writable; anything else is ignored.
///
/// Interval fields distinguish "absent" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepetitionPatch {
    pub name: Option<String>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub reminder_interval_1: Option<Option<i64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub reminder_interval_2: Option<Option<i64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub reminder_interval_3: Option<Option<i64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub reminder_interval_4: Option<Option<i64>>,
    pub is_muted: Option<bool>,
}

impl RepetitionPatch {
    pub fn intervals(&self) -> [Option<Option<i64>>; INTERVAL_SLOTS] {
        [
            self.reminder_interval_1,
            self.reminder_interval_2,
            self.reminder_interval_3,
            self.reminder_interval_4,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.content.is_none()
            && self.intervals().iter().all(Option::is_none)
            && self.is_muted.is_none()
    }
}

fn deserialize_some<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Singleton notification preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub enable_daily_reminder: bool,
    pub reminder_time: String,
}

/// Reminder time used for the daily notification.
pub const DEFAULT_REMINDER_TIME: &str = "22:00";

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enable_daily_reminder: true,
            reminder_time: DEFAULT_REMINDER_TIME.to_string(),
        }
    }
}

/// One answered question of a daily questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireEntry {
    pub id: Uuid,
    pub entry_date: NaiveDate,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A topic in the learning graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningNode {
    pub id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// Directed, labelled relation between two topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningEdge {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation: String,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of the whole learning graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningGraph {
    pub nodes: Vec<LearningNode>,
    pub edges: Vec<LearningEdge>,
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
