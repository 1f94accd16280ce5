//! studyvault-core: study tracking storage
//!
//! This crate owns the persistent state behind the note-taking app: spaced
//! repetition reminders, per-file usage statistics that follow files across
//! renames and moves, the daily questionnaire and the learning graph.

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod graph;
pub mod locks;
pub mod models;
pub mod paths;
pub mod questionnaire;
pub mod rebase;
pub mod scheduler;
pub mod schema;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::Database;
pub use error::Error;
pub use error::ErrorKind;
pub use error::Result;
pub use graph::LearningGraphStore;
pub use locks::WorkspaceLocks;
pub use questionnaire::QuestionnaireStore;
pub use rebase::PathRebaser;
pub use scheduler::RepetitionScheduler;

/// Application name used for config directories and paths.
pub const APP_NAME: &str = "studyvault";

/// Returns the environment variable prefix for this application.
pub fn env_prefix() -> String {
    "STUDYVAULT".to_string()
}
