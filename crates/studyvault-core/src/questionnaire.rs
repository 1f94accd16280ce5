//! Daily questionnaire answers.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::Row;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock, from_timestamp, whole_seconds};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::QuestionnaireEntry;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Stores one answer per question per day.
#[derive(Clone)]
pub struct QuestionnaireStore {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl QuestionnaireStore {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Save an answer. Answering the same question again on the same day
    /// replaces the previous answer.
    pub async fn record_answer(
        &self,
        date: NaiveDate,
        question: &str,
        answer: &str,
    ) -> Result<QuestionnaireEntry> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::Validation("question must not be empty".to_string()));
        }

        let now = whole_seconds(self.clock.now()).timestamp();
        let day = date.format(DATE_FORMAT).to_string();
        sqlx::query(
            r#"
            INSERT INTO questionnaire_entries (id, entry_date, question, answer, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(entry_date, question) DO UPDATE SET
                answer = excluded.answer,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&day)
        .bind(question)
        .bind(answer)
        .bind(now)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        let row = sqlx::query(
            "SELECT * FROM questionnaire_entries WHERE entry_date = ? AND question = ?",
        )
        .bind(&day)
        .bind(question)
        .fetch_one(self.db.pool())
        .await?;
        entry_from_row(&row)
    }

    /// Answers given on `date`, in the order they were first recorded.
    pub async fn entries_for(&self, date: NaiveDate) -> Result<Vec<QuestionnaireEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM questionnaire_entries WHERE entry_date = ? ORDER BY created_at, question",
        )
        .bind(date.format(DATE_FORMAT).to_string())
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Days with at least one answer, newest first.
    pub async fn entry_dates(&self) -> Result<Vec<NaiveDate>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT entry_date FROM questionnaire_entries ORDER BY entry_date DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(|(day,)| parse_date(day)).collect()
    }
}

fn parse_date(day: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(day, DATE_FORMAT)
        .map_err(|e| Error::Other(format!("invalid questionnaire date '{day}': {e}")))
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuestionnaireEntry> {
    let id: String = row.get("id");
    Ok(QuestionnaireEntry {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Other(format!("invalid questionnaire id '{id}': {e}")))?,
        entry_date: parse_date(row.get::<&str, _>("entry_date"))?,
        question: row.get("question"),
        answer: row.get("answer"),
        created_at: from_timestamp(row.get::<i64, _>("created_at")),
        updated_at: from_timestamp(row.get::<i64, _>("updated_at")),
    })
}
