//! Notification endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::notification::{Notification, NotificationView};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub message: String,
    pub updated: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

fn parse_notification_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound("Notification not found".to_string()))
}

/// GET /api/v1/notifications - newest first, related entity attached
#[tracing::instrument(name = "http.list_notifications", skip(state, caller), fields(user_id = %caller.id()))]
pub async fn list_notifications(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<NotificationView>>, AppError> {
    let notifications = state.notifications.list(caller.id()).await?;
    Ok(Json(notifications))
}

/// PUT /api/v1/notifications/{id}
#[tracing::instrument(name = "http.mark_notification_read", skip(state, caller), fields(user_id = %caller.id()))]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Notification>, AppError> {
    let id = parse_notification_id(&id)?;
    let notification = state.notifications.mark_read(caller.id(), id).await?;
    Ok(Json(notification))
}

/// PUT /api/v1/notifications/mark-all-read
#[tracing::instrument(name = "http.mark_all_read", skip(state, caller), fields(user_id = %caller.id()))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated = state.notifications.mark_all_read(caller.id()).await?;
    Ok(Json(MarkAllReadResponse {
        message: "All notifications marked as read".to_string(),
        updated,
    }))
}

/// DELETE /api/v1/notifications/{id}
#[tracing::instrument(name = "http.delete_notification", skip(state, caller), fields(user_id = %caller.id()))]
pub async fn delete_notification(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = parse_notification_id(&id)?;
    state.notifications.delete(caller.id(), id).await?;
    Ok(Json(DeleteResponse {
        message: "Notification deleted".to_string(),
    }))
}
