use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::services::AuthUser;
use crate::error::ApiError;
use crate::logs::dto::{AddEntryRequest, LogDetail, LogListItem, PatchEntryRequest};
use crate::logs::services;
use crate::state::AppState;

pub fn log_routes() -> Router<AppState> {
    Router::new()
        .route("/logs", get(list_logs).post(start_today))
        .route("/logs/:id", get(get_log).delete(delete_log))
        .route("/logs/:id/entries", post(add_entry))
        .route("/entries/:id", patch(patch_entry).delete(delete_entry))
}

#[instrument(skip(state))]
pub async fn list_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<LogListItem>>, ApiError> {
    let logs = services::list_logs(&state.db, user_id).await?;
    let items = logs
        .into_iter()
        .map(|(log, summary)| LogListItem::new(log, summary))
        .collect();
    Ok(Json(items))
}

/// Get or create today's log. 201 when a log was created, 200 when the
/// day already had one.
#[instrument(skip(state))]
pub async fn start_today(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<(StatusCode, Json<LogDetail>), ApiError> {
    let (log, created) = services::get_or_create_today(&state.db, user_id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let (log, entries, summary) = services::log_detail(&state.db, user_id, log.id).await?;
    Ok((status, Json(LogDetail::new(log, entries, summary))))
}

#[instrument(skip(state))]
pub async fn get_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LogDetail>, ApiError> {
    let (log, entries, summary) = services::log_detail(&state.db, user_id, id).await?;
    Ok(Json(LogDetail::new(log, entries, summary)))
}

#[instrument(skip(state))]
pub async fn delete_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    services::delete_log(&state.db, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, body))]
pub async fn add_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AddEntryRequest>,
) -> Result<(StatusCode, Json<LogDetail>), ApiError> {
    let (log, entries, summary) =
        services::add_entry(&state, user_id, id, &body.entry_query).await?;
    Ok((
        StatusCode::CREATED,
        Json(LogDetail::new(log, entries, summary)),
    ))
}

#[instrument(skip(state, body))]
pub async fn patch_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<PatchEntryRequest>,
) -> Result<Json<LogDetail>, ApiError> {
    let (log, entries, summary) = services::patch_entry(&state.db, user_id, id, &body).await?;
    Ok(Json(LogDetail::new(log, entries, summary)))
}

#[instrument(skip(state))]
pub async fn delete_entry(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<LogDetail>, ApiError> {
    let (log, entries, summary) = services::delete_entry(&state.db, user_id, id).await?;
    Ok(Json(LogDetail::new(log, entries, summary)))
}
