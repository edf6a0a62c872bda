//! JSON endpoints over the notification store.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::{AppState, CurrentUser};
use crate::notification::Notification;

/// Body of GET /notifications/unread/count.
#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: usize,
}

/// Handle GET /notifications.
#[tracing::instrument(skip_all)]
pub async fn list_all(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<Vec<Notification>> {
    Json(state.store.get_all(&user_id).await)
}

/// Handle GET /notifications/unread.
#[tracing::instrument(skip_all)]
pub async fn list_unread(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<Vec<Notification>> {
    Json(state.store.get_unread(&user_id).await)
}

/// Handle GET /notifications/unread/count.
#[tracing::instrument(skip_all)]
pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<UnreadCount> {
    Json(UnreadCount {
        count: state.store.unread_count(&user_id).await,
    })
}

/// Handle POST /notifications/{id}/read.
#[tracing::instrument(skip_all)]
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> StatusCode {
    state.store.mark_read(&user_id, &id).await;
    StatusCode::NO_CONTENT
}

/// Handle POST /notifications/read-all.
#[tracing::instrument(skip_all)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> StatusCode {
    state.store.mark_all_read(&user_id).await;
    StatusCode::NO_CONTENT
}
