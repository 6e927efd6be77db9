use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, patch},
};
use db::models::notification::Notification;
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiError};

#[derive(Debug, Clone, Serialize, TS)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ResponseJson<ApiResponse<NotificationsResponse>>, ApiError> {
    let notifications = Notification::find_by_user(&state.db.pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(NotificationsResponse {
        notifications,
    })))
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct NotificationResponse {
    pub notification: Notification,
}

/// PATCH /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<NotificationResponse>>, ApiError> {
    let notification = Notification::mark_read(&state.db.pool, notification_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("notification not found".to_string()))?;

    Ok(ResponseJson(ApiResponse::success(NotificationResponse {
        notification,
    })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/notifications",
        Router::new()
            .route("/", get(list_notifications))
            .route("/{id}/read", patch(mark_read)),
    )
}
