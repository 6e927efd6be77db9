use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use chrono::{DateTime, Utc};
use db::models::user::User;
use serde::Serialize;
use services::services::connection::ConnectionService;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, auth::CurrentUser, error::ApiError};

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub total_growth_points: i64,
    pub engagement_level: i64,
    pub weekly_connections_used: i64,
    pub weekly_connections_limit: i64,
    pub weekly_connections_reset_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ProfileResponse {
    pub user: User,
    pub stats: ProfileStats,
}

/// GET /api/user/profile
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ResponseJson<ApiResponse<ProfileResponse>>, ApiError> {
    let quota = ConnectionService::weekly_quota(&state.db.pool, user.id).await?;

    User::touch_last_active(&state.db.pool, user.id).await?;

    let stats = ProfileStats {
        total_growth_points: user.growth_points,
        engagement_level: user.engagement_level,
        weekly_connections_used: quota.used,
        weekly_connections_limit: quota.limit,
        weekly_connections_reset_at: quota.resets_at,
    };

    Ok(ResponseJson(ApiResponse::success(ProfileResponse {
        user,
        stats,
    })))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/user/profile", get(get_profile))
}
