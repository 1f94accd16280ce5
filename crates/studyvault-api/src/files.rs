//! File rename, move and delete endpoints.
//!
//! Each handler performs the file system change first and then updates
//! usage records, holding the workspace lock across both steps. When the
//! usage update fails the file system change is undone before the error is
//! returned.

use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use studyvault_core::{PathRebaser, paths};
use uuid::Uuid;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub base_path: String,
    pub relative_path: String,
    pub new_relative_path: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub base_path: String,
    pub relative_path: String,
    /// Target workspace root; defaults to `base_path`.
    pub new_base_path: Option<String>,
    pub new_relative_path: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub base_path: String,
    pub relative_path: String,
}

#[derive(Debug, Serialize)]
pub struct FileChange {
    pub absolute_path: String,
    pub new_absolute_path: Option<String>,
    pub is_folder: bool,
    pub records_updated: u64,
}

pub async fn rename(
    State(state): State<AppState>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<Json<FileChange>> {
    let guard = state.locks.lock(&req.base_path).await;
    log::debug!("Renaming inside {}", guard.workspace());
    let change = relocate(
        &state.rebaser,
        &req.base_path,
        &req.relative_path,
        &req.base_path,
        &req.new_relative_path,
    )
    .await?;
    Ok(Json(change))
}

pub async fn move_entry(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<Json<FileChange>> {
    let new_base = req.new_base_path.unwrap_or_else(|| req.base_path.clone());
    let _guards = state.locks.lock_pair(&req.base_path, &new_base).await;
    let change = relocate(
        &state.rebaser,
        &req.base_path,
        &req.relative_path,
        &new_base,
        &req.new_relative_path,
    )
    .await?;
    Ok(Json(change))
}

pub async fn delete(
    State(state): State<AppState>,
    Json(req): Json<DeleteRequest>,
) -> ApiResult<Json<FileChange>> {
    let guard = state.locks.lock(&req.base_path).await;
    log::debug!("Deleting inside {}", guard.workspace());
    let target = inside_workspace(&req.base_path, &req.relative_path)?;
    let is_folder = entry_is_dir(&target).await?;

    // Park the entry under a hidden sibling name so it can be restored if
    // the usage records cannot be removed.
    let staged = staging_path(&target);
    tokio::fs::rename(&target, &staged).await?;

    let records_updated = match state
        .rebaser
        .delete_usage(&req.base_path, &req.relative_path, is_folder)
        .await
    {
        Ok(rows) => rows,
        Err(err) => {
            undo_rename(&staged, &target).await;
            return Err(err.into());
        }
    };

    let removed = if is_folder {
        tokio::fs::remove_dir_all(&staged).await
    } else {
        tokio::fs::remove_file(&staged).await
    };
    if let Err(err) = removed {
        log::warn!("Usage for {target} removed but {staged} is left on disk: {err}");
    }
    log::info!("Deleted {target} ({records_updated} usage records)");

    Ok(Json(FileChange {
        absolute_path: target,
        new_absolute_path: None,
        is_folder,
        records_updated,
    }))
}

async fn relocate(
    rebaser: &PathRebaser,
    base_path: &str,
    relative_path: &str,
    new_base_path: &str,
    new_relative_path: &str,
) -> ApiResult<FileChange> {
    let source = inside_workspace(base_path, relative_path)?;
    let target = inside_workspace(new_base_path, new_relative_path)?;
    if source == target {
        return Err(ApiError::validation("source and target are the same"));
    }

    let is_folder = entry_is_dir(&source).await?;
    if is_folder && paths::is_within(&target, &source) {
        return Err(ApiError::validation(format!(
            "cannot move '{source}' into itself"
        )));
    }
    if tokio::fs::try_exists(&target).await? {
        return Err(ApiError::validation(format!("'{target}' already exists")));
    }
    if let Some(parent) = Path::new(&target).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::rename(&source, &target).await?;

    let updated = if is_folder {
        rebaser
            .rebase_subtree(base_path, relative_path, new_base_path, new_relative_path)
            .await
    } else {
        let new_relative = paths::relative(new_base_path, &target);
        rebaser
            .rename_single_file(
                &source,
                &target,
                new_base_path,
                &new_relative,
                &paths::basename(&target),
            )
            .await
    };
    let records_updated = match updated {
        Ok(rows) => rows,
        Err(err) => {
            undo_rename(&target, &source).await;
            return Err(err.into());
        }
    };
    log::info!("Moved {source} -> {target} ({records_updated} usage records)");

    Ok(FileChange {
        absolute_path: source,
        new_absolute_path: Some(target),
        is_folder,
        records_updated,
    })
}

/// Resolve `relative` under `base`, refusing paths that escape it.
fn inside_workspace(base: &str, relative: &str) -> ApiResult<String> {
    let root = paths::normalize(base);
    let resolved = paths::resolve(base, relative);
    if resolved == root || !paths::is_within(&resolved, &root) {
        return Err(ApiError::validation(format!(
            "'{relative}' is not inside workspace '{root}'"
        )));
    }
    Ok(resolved)
}

/// Hidden sibling of `path` used while a delete is in flight.
fn staging_path(path: &str) -> String {
    let name = paths::basename(path);
    let parent = path.strip_suffix(&name).unwrap_or(path);
    format!("{parent}.{name}.deleting-{}", Uuid::new_v4().simple())
}

/// Best-effort rollback of a rename whose usage update failed.
async fn undo_rename(from: &str, to: &str) {
    match tokio::fs::rename(from, to).await {
        Ok(()) => log::warn!("Usage update failed, restored {to}"),
        Err(err) => {
            log::error!("Usage update failed and {from} could not be moved back to {to}: {err}");
        }
    }
}

async fn entry_is_dir(path: &str) -> ApiResult<bool> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.is_dir()),
        Err(err) if err.kind() == IoErrorKind::NotFound => {
            Err(ApiError::not_found(format!("file '{path}'")))
        }
        Err(err) => Err(err.into()),
    }
}
