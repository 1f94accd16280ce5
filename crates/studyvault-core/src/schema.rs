//! Database schema for studyvault.

/// Current schema version, recorded in `schema_migrations` on open.
pub const SCHEMA_VERSION: i64 = 1;

/// Full schema. Every statement is idempotent so it runs on each open.
pub const SCHEMA: &str = r#"
-- Schema migration tracking table
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL
);

-- Per-file usage statistics, one row per tracked absolute path
CREATE TABLE IF NOT EXISTS file_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    absolute_path TEXT NOT NULL UNIQUE,
    base_path TEXT NOT NULL,
    relative_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    last_accessed_at INTEGER NOT NULL,
    last_opened_or_edited_at INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 1
);

-- Spaced repetition items
CREATE TABLE IF NOT EXISTS repetitions (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    reminder_interval_1 INTEGER,
    reminder_interval_2 INTEGER,
    reminder_interval_3 INTEGER,
    reminder_interval_4 INTEGER,
    current_interval_index INTEGER NOT NULL DEFAULT 0,
    next_reminder_date INTEGER,
    last_completed_at INTEGER,
    is_muted INTEGER NOT NULL DEFAULT 0
);

-- Singleton notification settings
CREATE TABLE IF NOT EXISTS notification_settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    enable_daily_reminder INTEGER NOT NULL DEFAULT 1,
    reminder_time TEXT NOT NULL DEFAULT '22:00'
);

-- Daily questionnaire answers
CREATE TABLE IF NOT EXISTS questionnaire_entries (
    id TEXT PRIMARY KEY,
    entry_date TEXT NOT NULL,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(entry_date, question)
);

-- Learning graph
CREATE TABLE IF NOT EXISTS learning_nodes (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS learning_edges (
    source_id TEXT NOT NULL REFERENCES learning_nodes(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES learning_nodes(id) ON DELETE CASCADE,
    relation TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (source_id, target_id, relation)
);

CREATE INDEX IF NOT EXISTS idx_file_usage_base ON file_usage(base_path);
CREATE INDEX IF NOT EXISTS idx_file_usage_recent ON file_usage(base_path, last_opened_or_edited_at);
CREATE INDEX IF NOT EXISTS idx_repetitions_next ON repetitions(next_reminder_date);
CREATE INDEX IF NOT EXISTS idx_questionnaire_date ON questionnaire_entries(entry_date);
"#;

/// Default notification settings row.
pub const INIT_NOTIFICATION_SETTINGS: &str = r#"
INSERT OR IGNORE INTO notification_settings (id, enable_daily_reminder, reminder_time)
VALUES (1, 1, '22:00');
"#;

/// User-data tables cleared by a full reset, in deletion order.
pub const USER_TABLES: [&str; 6] = [
    "learning_edges",
    "learning_nodes",
    "questionnaire_entries",
    "repetitions",
    "file_usage",
    "notification_settings",
];
