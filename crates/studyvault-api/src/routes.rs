//! Reminder, usage, settings and maintenance endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use studyvault_core::db::DatabaseStats;
use studyvault_core::models::{
    NewRepetition, NotificationSettings, RepetitionItem, RepetitionPatch, UsageRecord,
};
use uuid::Uuid;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

// ============================================================================
// Repetitions
// ============================================================================

pub async fn list_repetitions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<RepetitionItem>>> {
    Ok(Json(state.scheduler.list_all().await?))
}

pub async fn due_repetitions(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<RepetitionItem>>> {
    Ok(Json(state.scheduler.list_due(Utc::now()).await?))
}

pub async fn create_repetition(
    State(state): State<AppState>,
    Json(new): Json<NewRepetition>,
) -> ApiResult<(StatusCode, Json<RepetitionItem>)> {
    if !new.reminder_intervals.has_any() {
        return Err(ApiError::validation(
            "at least one positive reminder interval is required",
        ));
    }
    let item = state.scheduler.create(new).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_repetition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RepetitionItem>> {
    state
        .scheduler
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("repetition '{id}'")))
}

pub async fn update_repetition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<RepetitionPatch>,
) -> ApiResult<Json<RepetitionItem>> {
    Ok(Json(state.scheduler.update(id, patch).await?))
}

pub async fn delete_repetition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if state.scheduler.delete(id).await? == 0 {
        return Err(ApiError::not_found(format!("repetition '{id}'")));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn complete_repetition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RepetitionItem>> {
    Ok(Json(state.scheduler.complete(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct MuteRequest {
    pub is_muted: bool,
}

pub async fn mute_repetition(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<MuteRequest>,
) -> ApiResult<Json<RepetitionItem>> {
    Ok(Json(state.scheduler.set_muted(id, req.is_muted).await?))
}

// ============================================================================
// Usage
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AccessRequest {
    pub base_path: String,
    pub relative_path: String,
    pub file_name: Option<String>,
}

/// Always succeeds; tracking failures are logged by the rebaser.
pub async fn record_access(
    State(state): State<AppState>,
    Json(req): Json<AccessRequest>,
) -> StatusCode {
    let file_name = req
        .file_name
        .unwrap_or_else(|| studyvault_core::paths::basename(&req.relative_path));
    state
        .rebaser
        .record_access(&req.base_path, &req.relative_path, &file_name)
        .await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub base_path: String,
    pub limit: Option<i64>,
}

pub async fn recent_files(
    State(state): State<AppState>,
    Query(params): Query<UsageQuery>,
) -> ApiResult<Json<Vec<UsageRecord>>> {
    let limit = params.limit.unwrap_or(state.config.usage.list_limit);
    Ok(Json(
        state.rebaser.query_recent(&params.base_path, limit).await?,
    ))
}

pub async fn frequent_files(
    State(state): State<AppState>,
    Query(params): Query<UsageQuery>,
) -> ApiResult<Json<Vec<UsageRecord>>> {
    let limit = params.limit.unwrap_or(state.config.usage.list_limit);
    Ok(Json(
        state
            .rebaser
            .query_frequent(&params.base_path, limit)
            .await?,
    ))
}

// ============================================================================
// Settings and maintenance
// ============================================================================

pub async fn get_notification_settings(
    State(state): State<AppState>,
) -> ApiResult<Json<NotificationSettings>> {
    Ok(Json(state.db.notification_settings().await?))
}

#[derive(Debug, Deserialize)]
pub struct NotificationUpdate {
    pub enable_daily_reminder: bool,
}

pub async fn update_notification_settings(
    State(state): State<AppState>,
    Json(update): Json<NotificationUpdate>,
) -> ApiResult<Json<NotificationSettings>> {
    Ok(Json(
        state
            .db
            .set_daily_reminder(update.enable_daily_reminder)
            .await?,
    ))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<DatabaseStats>> {
    Ok(Json(state.db.stats().await?))
}

pub async fn reset(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.db.reset_all().await?;
    log::warn!("All user data was reset");
    Ok(StatusCode::NO_CONTENT)
}
