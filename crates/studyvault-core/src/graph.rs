//! Learning graph: topics and the relations between them.

use std::sync::Arc;

use sqlx::Row;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock, from_timestamp, whole_seconds};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{LearningEdge, LearningGraph, LearningNode};

#[derive(Clone)]
pub struct LearningGraphStore {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl LearningGraphStore {
    pub fn new(db: Database) -> Self {
        Self::with_clock(db, Arc::new(SystemClock))
    }

    pub fn with_clock(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Add a topic, or return the existing one with the same label.
    pub async fn add_node(&self, label: &str) -> Result<LearningNode> {
        let label = label.trim();
        if label.is_empty() {
            return Err(Error::Validation("topic label must not be empty".to_string()));
        }

        sqlx::query(
            "INSERT INTO learning_nodes (id, label, created_at) VALUES (?, ?, ?) ON CONFLICT(label) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(label)
        .bind(whole_seconds(self.clock.now()).timestamp())
        .execute(self.db.pool())
        .await?;

        let row = sqlx::query("SELECT * FROM learning_nodes WHERE label = ?")
            .bind(label)
            .fetch_one(self.db.pool())
            .await?;
        node_from_row(&row)
    }

    /// Connect two existing topics. Linking the same pair with the same
    /// relation twice keeps a single edge.
    pub async fn link(&self, source: Uuid, target: Uuid, relation: &str) -> Result<LearningEdge> {
        if source == target {
            return Err(Error::Validation("a topic cannot link to itself".to_string()));
        }
        let relation = relation.trim();
        if relation.is_empty() {
            return Err(Error::Validation("relation must not be empty".to_string()));
        }
        for id in [source, target] {
            let exists: Option<(String,)> =
                sqlx::query_as("SELECT id FROM learning_nodes WHERE id = ?")
                    .bind(id.to_string())
                    .fetch_optional(self.db.pool())
                    .await?;
            if exists.is_none() {
                return Err(Error::NotFound(format!("topic '{id}'")));
            }
        }

        sqlx::query(
            r#"
            INSERT INTO learning_edges (source_id, target_id, relation, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(source_id, target_id, relation) DO NOTHING
            "#,
        )
        .bind(source.to_string())
        .bind(target.to_string())
        .bind(relation)
        .bind(whole_seconds(self.clock.now()).timestamp())
        .execute(self.db.pool())
        .await?;

        let row = sqlx::query(
            "SELECT * FROM learning_edges WHERE source_id = ? AND target_id = ? AND relation = ?",
        )
        .bind(source.to_string())
        .bind(target.to_string())
        .bind(relation)
        .fetch_one(self.db.pool())
        .await?;
        edge_from_row(&row)
    }

    /// Remove a topic and every edge touching it.
    pub async fn remove_node(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM learning_nodes WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    /// Every topic and relation.
    pub async fn graph(&self) -> Result<LearningGraph> {
        let nodes = sqlx::query("SELECT * FROM learning_nodes ORDER BY created_at, label")
            .fetch_all(self.db.pool())
            .await?;
        let edges =
            sqlx::query("SELECT * FROM learning_edges ORDER BY created_at, source_id, target_id")
                .fetch_all(self.db.pool())
                .await?;

        Ok(LearningGraph {
            nodes: nodes.iter().map(node_from_row).collect::<Result<_>>()?,
            edges: edges.iter().map(edge_from_row).collect::<Result<_>>()?,
        })
    }
}

fn parse_id(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Other(format!("invalid topic id '{value}': {e}")))
}

fn node_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LearningNode> {
    Ok(LearningNode {
        id: parse_id(row.get::<&str, _>("id"))?,
        label: row.get("label"),
        created_at: from_timestamp(row.get::<i64, _>("created_at")),
    })
}

fn edge_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LearningEdge> {
    Ok(LearningEdge {
        source_id: parse_id(row.get::<&str, _>("source_id"))?,
        target_id: parse_id(row.get::<&str, _>("target_id"))?,
        relation: row.get("relation"),
        created_at: from_timestamp(row.get::<i64, _>("created_at")),
    })
}
