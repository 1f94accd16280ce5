use super::*;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    dir: TempDir,
    db: Database,
    app: Router,
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            database: dir.path().join("api.db"),
            ..Config::default()
        };
        let db = Database::open(&config.database).await.expect("open db");
        let app = router(AppState::new(config, db.clone()));
        Self { dir, db, app }
    }

    /// Workspace root inside the temp dir, created on first use.
    fn workspace(&self, name: &str) -> String {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path).expect("create workspace");
        path.to_string_lossy().into_owned()
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    async fn touch(&self, base: &str, relative: &str) {
        let path = std::path::Path::new(base).join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(&path, "content").expect("write file");
        let (status, _) = self
            .send(
                "POST",
                "/usage/access",
                Some(json!({ "base_path": base, "relative_path": relative })),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    async fn recent_paths(&self, base: &str) -> Vec<String> {
        let (status, body) = self
            .send("GET", &format!("/usage/recent?base_path={base}"), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let mut paths: Vec<String> = body
            .as_array()
            .expect("array")
            .iter()
            .map(|record| record["absolute_path"].as_str().expect("path").to_string())
            .collect();
        paths.sort();
        paths
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

// ============================================================================
// Repetitions
// ============================================================================

#[tokio::test]
async fn create_requires_a_positive_interval() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(
            "POST",
            "/repetitions",
            Some(json!({ "name": "Empty", "reminder_intervals": [null, 0, null, null] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().is_some());

    let (status, _) = app
        .send(
            "POST",
            "/repetitions",
            Some(json!({ "name": "Negative", "reminder_intervals": [-1, 3, null, null] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_or_malformed_ids() {
    let app = TestApp::new().await;
    let missing = Uuid::new_v4();

    let (status, _) = app
        .send("GET", &format!("/repetitions/{missing}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send("POST", &format!("/repetitions/{missing}/complete"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send("DELETE", &format!("/repetitions/{missing}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("GET", "/repetitions/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reminder_lifecycle() {
    let app = TestApp::new().await;

    let (status, item) = app
        .send(
            "POST",
            "/repetitions",
            Some(json!({
                "name": "Irregular verbs",
                "content": "go, went, gone",
                "reminder_intervals": [1, 3, null, null]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["current_interval_index"], 0);
    let id = item["id"].as_str().expect("id").to_string();

    let (status, item) = app
        .send("POST", &format!("/repetitions/{id}/complete"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["current_interval_index"], 1);
    assert!(item["last_completed_at"].is_string());

    let (status, item) = app
        .send(
            "PUT",
            &format!("/repetitions/{id}/mute"),
            Some(json!({ "is_muted": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["is_muted"], true);

    let (status, item) = app
        .send(
            "PATCH",
            &format!("/repetitions/{id}"),
            Some(json!({ "name": "Verbs", "current_interval_index": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["name"], "Verbs");
    assert_eq!(item["current_interval_index"], 1);

    let (_, all) = app.send("GET", "/repetitions", None).await;
    assert_eq!(all.as_array().map(Vec::len), Some(1));

    let (status, due) = app.send("GET", "/repetitions/due", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(due.as_array().map(Vec::len), Some(0));

    let (status, _) = app
        .send("DELETE", &format!("/repetitions/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send("GET", &format!("/repetitions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Files
// ============================================================================

#[tokio::test]
async fn renaming_a_file_carries_its_usage() {
    let app = TestApp::new().await;
    let ws = app.workspace("ws");
    app.touch(&ws, "notes/a.md").await;

    let (status, change) = app
        .send(
            "POST",
            "/files/rename",
            Some(json!({
                "base_path": ws,
                "relative_path": "notes/a.md",
                "new_relative_path": "notes/b.md"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["is_folder"], false);
    assert_eq!(change["records_updated"], 1);

    assert!(!std::path::Path::new(&ws).join("notes/a.md").exists());
    assert!(std::path::Path::new(&ws).join("notes/b.md").exists());
    assert_eq!(app.recent_paths(&ws).await, vec![format!("{ws}/notes/b.md")]);
}

#[tokio::test]
async fn moving_a_folder_across_workspaces() {
    let app = TestApp::new().await;
    let source = app.workspace("source");
    let target = app.workspace("target");
    app.touch(&source, "notes/a.md").await;
    app.touch(&source, "notes/deep/b.md").await;
    app.touch(&source, "notes-old.md").await;

    let (status, change) = app
        .send(
            "POST",
            "/files/move",
            Some(json!({
                "base_path": source,
                "relative_path": "notes",
                "new_base_path": target,
                "new_relative_path": "archive/notes"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["is_folder"], true);
    assert_eq!(change["records_updated"], 2);

    assert!(
        std::path::Path::new(&target)
            .join("archive/notes/deep/b.md")
            .exists()
    );
    assert_eq!(
        app.recent_paths(&target).await,
        vec![
            format!("{target}/archive/notes/a.md"),
            format!("{target}/archive/notes/deep/b.md"),
        ]
    );
    assert_eq!(
        app.recent_paths(&source).await,
        vec![format!("{source}/notes-old.md")]
    );
}

#[tokio::test]
async fn deleting_a_folder_forgets_its_files() {
    let app = TestApp::new().await;
    let ws = app.workspace("ws");
    app.touch(&ws, "drafts/one.md").await;
    app.touch(&ws, "drafts/two.md").await;
    app.touch(&ws, "keep.md").await;

    let (status, change) = app
        .send(
            "POST",
            "/files/delete",
            Some(json!({ "base_path": ws, "relative_path": "drafts" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["records_updated"], 2);
    assert!(!std::path::Path::new(&ws).join("drafts").exists());
    assert_eq!(app.recent_paths(&ws).await, vec![format!("{ws}/keep.md")]);
}

#[tokio::test]
async fn failed_rename_leaves_the_file_in_place() {
    let app = TestApp::new().await;
    let ws = app.workspace("ws");
    app.touch(&ws, "notes/a.md").await;
    // A stale record already claims the destination path.
    let (status, _) = app
        .send(
            "POST",
            "/usage/access",
            Some(json!({ "base_path": ws, "relative_path": "archive/a.md" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            "POST",
            "/files/rename",
            Some(json!({
                "base_path": ws,
                "relative_path": "notes/a.md",
                "new_relative_path": "archive/a.md"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert!(std::path::Path::new(&ws).join("notes/a.md").exists());
    assert!(!std::path::Path::new(&ws).join("archive/a.md").exists());
    assert_eq!(
        app.recent_paths(&ws).await,
        vec![format!("{ws}/archive/a.md"), format!("{ws}/notes/a.md")]
    );
}

#[tokio::test]
async fn failed_folder_move_leaves_the_folder_in_place() {
    let app = TestApp::new().await;
    let ws = app.workspace("ws");
    app.touch(&ws, "notes/a.md").await;
    app.touch(&ws, "notes/deep/b.md").await;
    let (status, _) = app
        .send(
            "POST",
            "/usage/access",
            Some(json!({ "base_path": ws, "relative_path": "moved/deep/b.md" })),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            "POST",
            "/files/move",
            Some(json!({
                "base_path": ws,
                "relative_path": "notes",
                "new_relative_path": "moved"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert!(std::path::Path::new(&ws).join("notes/deep/b.md").exists());
    assert!(!std::path::Path::new(&ws).join("moved").exists());
}

#[tokio::test]
async fn failed_delete_keeps_files_on_disk() {
    let app = TestApp::new().await;
    let ws = app.workspace("ws");
    app.touch(&ws, "drafts/one.md").await;
    app.touch(&ws, "drafts/two.md").await;

    sqlx::raw_sql(
        "CREATE TRIGGER fail_usage_delete BEFORE DELETE ON file_usage
         BEGIN SELECT RAISE(ABORT, 'usage delete blocked'); END;",
    )
    .execute(app.db.pool())
    .await
    .expect("install trigger");

    let (status, _) = app
        .send(
            "POST",
            "/files/delete",
            Some(json!({ "base_path": ws, "relative_path": "drafts" })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert!(std::path::Path::new(&ws).join("drafts/one.md").exists());
    assert!(std::path::Path::new(&ws).join("drafts/two.md").exists());
    let leftovers: Vec<_> = std::fs::read_dir(&ws)
        .expect("read workspace")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(leftovers, vec!["drafts".to_string()]);
    assert_eq!(app.recent_paths(&ws).await.len(), 2);
}

#[tokio::test]
async fn file_operations_reject_bad_paths() {
    let app = TestApp::new().await;
    let ws = app.workspace("ws");
    app.touch(&ws, "notes/a.md").await;

    let (status, _) = app
        .send(
            "POST",
            "/files/rename",
            Some(json!({
                "base_path": ws,
                "relative_path": "notes/a.md",
                "new_relative_path": "../escaped.md"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/files/move",
            Some(json!({
                "base_path": ws,
                "relative_path": "notes",
                "new_relative_path": "notes/inner"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            "POST",
            "/files/delete",
            Some(json!({ "base_path": ws, "relative_path": "missing.md" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert!(std::path::Path::new(&ws).join("notes/a.md").exists());
}

// ============================================================================
// Settings and maintenance
// ============================================================================

#[tokio::test]
async fn notification_settings_and_reset() {
    let app = TestApp::new().await;
    let ws = app.workspace("ws");
    app.touch(&ws, "a.md").await;

    let (status, settings) = app
        .send(
            "PUT",
            "/settings/notifications",
            Some(json!({ "enable_daily_reminder": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["enable_daily_reminder"], false);
    assert_eq!(settings["reminder_time"], "22:00");

    let (status, _) = app.send("POST", "/reset", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, settings) = app.send("GET", "/settings/notifications", None).await;
    assert_eq!(settings["enable_daily_reminder"], true);
    let (_, stats) = app.send("GET", "/stats", None).await;
    assert_eq!(stats["file_usage"], 0);
}
