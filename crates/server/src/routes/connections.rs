//! Routes for the connection request lifecycle.

use std::str::FromStr;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use db::models::{
    connection::{Connection, RespondAction},
    user::UserPublic,
};
use serde::{Deserialize, Serialize};
use services::services::connection::{ActiveConnection, ConnectionService, PendingRequest};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::CurrentUser, error::ApiError};

/// Callers see at most this many suggestions at once.
const POTENTIAL_CONNECTIONS_LIMIT: i64 = 10;

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionRequest {
    pub recipient_id: Option<Uuid>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ConnectionCreatedResponse {
    pub connection: Connection,
}

/// POST /api/connections/request
pub async fn create_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    axum::Json(payload): axum::Json<CreateConnectionRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ConnectionCreatedResponse>>), ApiError> {
    let recipient_id = payload
        .recipient_id
        .ok_or_else(|| ApiError::InvalidArgument("recipientId is required".to_string()))?;

    let connection = ConnectionService::request_connection(
        &state.db.pool,
        &state.notifications,
        &user,
        recipient_id,
        payload.message.as_deref(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(ConnectionCreatedResponse {
            connection,
        })),
    ))
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct RespondToRequest {
    pub action: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct RespondResponse {
    pub message: String,
}

/// PATCH /api/connections/requests/{id}
pub async fn respond_to_request(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(request_id): Path<Uuid>,
    axum::Json(payload): axum::Json<RespondToRequest>,
) -> Result<ResponseJson<ApiResponse<RespondResponse>>, ApiError> {
    let action = RespondAction::from_str(&payload.action)
        .map_err(|_| ApiError::InvalidArgument("invalid action".to_string()))?;

    let status = ConnectionService::respond_to_request(
        &state.db.pool,
        &state.notifications,
        &user,
        request_id,
        action,
    )
    .await?;

    Ok(ResponseJson(ApiResponse::success(RespondResponse {
        message: format!("Connection {status} successfully"),
    })))
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct PendingRequestsResponse {
    pub requests: Vec<PendingRequest>,
}

/// GET /api/connections/requests
pub async fn list_pending(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ResponseJson<ApiResponse<PendingRequestsResponse>>, ApiError> {
    let requests = ConnectionService::pending_requests(&state.db.pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(
        PendingRequestsResponse { requests },
    )))
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ActiveConnectionsResponse {
    pub connections: Vec<ActiveConnection>,
}

/// GET /api/connections/active
pub async fn list_active(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ResponseJson<ApiResponse<ActiveConnectionsResponse>>, ApiError> {
    let connections = ConnectionService::active_connections(&state.db.pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(
        ActiveConnectionsResponse { connections },
    )))
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PotentialConnectionsResponse {
    pub potential_connections: Vec<UserPublic>,
    pub total_count: usize,
}

/// GET /api/connections/potential
pub async fn list_potential(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ResponseJson<ApiResponse<PotentialConnectionsResponse>>, ApiError> {
    let potential_connections = ConnectionService::potential_connections(
        &state.db.pool,
        user.id,
        POTENTIAL_CONNECTIONS_LIMIT,
    )
    .await?;
    let total_count = potential_connections.len();

    Ok(ResponseJson(ApiResponse::success(
        PotentialConnectionsResponse {
            potential_connections,
            total_count,
        },
    )))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/connections",
        Router::new()
            .route("/request", post(create_request))
            .route("/requests", get(list_pending))
            .route("/requests/{id}", patch(respond_to_request))
            .route("/active", get(list_active))
            .route("/potential", get(list_potential)),
    )
}
