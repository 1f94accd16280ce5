//! Integration tests for cross-table storage operations.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use studyvault_core::models::{
    LearningGraph, NewRepetition, NotificationSettings, QuestionnaireEntry, ReminderIntervals,
    RepetitionItem,
};
use studyvault_core::{
    Database, ErrorKind, LearningGraphStore, PathRebaser, QuestionnaireStore, RepetitionScheduler,
};
use uuid::Uuid;

fn temp_db_path() -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    let filename = format!("studyvault-storage-test-{}.db", Uuid::new_v4());
    path.push(filename);
    path
}

#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    usage: BTreeSet<String>,
    repetitions: Vec<RepetitionItem>,
    settings: NotificationSettings,
    questionnaire: Vec<QuestionnaireEntry>,
    graph: LearningGraph,
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date")
}

async fn populate(db: &Database) {
    let rebaser = PathRebaser::new(db.clone());
    for relative in ["notes/a.md", "notes/b.md", "todo.md"] {
        rebaser
            .try_record_access("/ws", relative, relative)
            .await
            .expect("track");
    }

    let scheduler = RepetitionScheduler::new(db.clone());
    scheduler
        .create(NewRepetition {
            name: "Greek verbs".to_string(),
            content: String::new(),
            reminder_intervals: ReminderIntervals::new([Some(1), Some(3), None, None]),
        })
        .await
        .expect("create");

    db.set_daily_reminder(false).await.expect("settings");

    let questionnaire = QuestionnaireStore::new(db.clone());
    questionnaire
        .record_answer(day(), "What did you learn?", "Aorist tense")
        .await
        .expect("answer");

    let graph = LearningGraphStore::new(db.clone());
    let greek = graph.add_node("Greek").await.expect("node");
    let verbs = graph.add_node("Verbs").await.expect("node");
    graph.link(greek.id, verbs.id, "contains").await.expect("link");
}

async fn snapshot(db: &Database) -> Snapshot {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT absolute_path FROM file_usage")
        .fetch_all(db.pool())
        .await
        .expect("usage");
    Snapshot {
        usage: rows.into_iter().map(|(path,)| path).collect(),
        repetitions: RepetitionScheduler::new(db.clone())
            .list_all()
            .await
            .expect("repetitions"),
        settings: db.notification_settings().await.expect("settings"),
        questionnaire: QuestionnaireStore::new(db.clone())
            .entries_for(day())
            .await
            .expect("questionnaire"),
        graph: LearningGraphStore::new(db.clone())
            .graph()
            .await
            .expect("graph"),
    }
}

#[tokio::test]
async fn open_initializes_schema_and_settings() {
    let db = Database::open(&temp_db_path()).await.expect("open db");

    assert_eq!(db.schema_version().await.expect("version"), 1);
    assert_eq!(
        db.notification_settings().await.expect("settings"),
        NotificationSettings::default()
    );
    assert_eq!(db.stats().await.expect("stats"), Default::default());
}

#[tokio::test]
async fn daily_reminder_toggle_keeps_time() {
    let db = Database::open(&temp_db_path()).await.expect("open db");

    let settings = db.set_daily_reminder(false).await.expect("disable");
    assert!(!settings.enable_daily_reminder);
    assert_eq!(settings.reminder_time, "22:00");

    let settings = db.set_daily_reminder(true).await.expect("enable");
    assert!(settings.enable_daily_reminder);
}

#[tokio::test]
async fn reset_clears_everything_and_restores_defaults() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    populate(&db).await;

    let stats = db.stats().await.expect("stats");
    assert_eq!(stats.file_usage, 3);
    assert_eq!(stats.repetitions, 1);
    assert_eq!(stats.learning_edges, 1);

    db.reset_all().await.expect("reset");

    assert_eq!(db.stats().await.expect("stats"), Default::default());
    assert_eq!(
        db.notification_settings().await.expect("settings"),
        NotificationSettings::default()
    );
}

#[tokio::test]
async fn failed_reset_rolls_back_every_table() {
    let db = Database::open(&temp_db_path()).await.expect("open db");
    populate(&db).await;
    let before = snapshot(&db).await;

    // Deletion order clears the learning graph and questionnaire first, so
    // this aborts after three of the six tables are already emptied.
    sqlx::raw_sql(
        r#"
        CREATE TRIGGER fail_reset BEFORE DELETE ON repetitions
        BEGIN
            SELECT RAISE(ABORT, 'injected fault');
        END;
        "#,
    )
    .execute(db.pool())
    .await
    .expect("install fault");

    let err = db.reset_all().await.expect_err("injected failure");
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(snapshot(&db).await, before);

    sqlx::raw_sql("DROP TRIGGER fail_reset")
        .execute(db.pool())
        .await
        .expect("remove fault");
    db.reset_all().await.expect("reset");
    assert_eq!(db.stats().await.expect("stats"), Default::default());
}
