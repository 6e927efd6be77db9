//! Ingestion endpoint for identity-provider webhooks.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::post,
};
use chrono::Utc;
use services::services::identity::{self, IdentityEvent, IdentityWebhookVerifier, WebhookError};
use tracing::debug;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidArgument(format!("missing {name} header")))
}

/// POST /api/webhooks/identity
pub async fn identity_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let msg_id = header_str(&headers, "svix-id")?;
    let timestamp = header_str(&headers, "svix-timestamp")?;
    let signature = header_str(&headers, "svix-signature")?;

    let verifier = IdentityWebhookVerifier::new(&state.config.webhook_secret)?;
    verifier.verify(msg_id, timestamp, signature, &body, Utc::now())?;

    let event: IdentityEvent =
        serde_json::from_slice(&body).map_err(WebhookError::from)?;

    match event.kind.as_str() {
        "user.created" => {
            identity::provision_user(&state.db.pool, &event.data).await?;
        }
        other => {
            debug!(kind = other, "ignoring identity event");
        }
    }

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/webhooks/identity", post(identity_webhook))
}
