use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use services::services::{connection::ConnectionError, identity::WebhookError};
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

/// Error kinds surfaced at the HTTP boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthenticated,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("weekly connection limit reached")]
    QuotaExceeded { resets_at: DateTime<Utc> },
    #[error("connection request already exists")]
    DuplicateRequest,
    #[error("server misconfiguration: {0}")]
    Misconfigured(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl From<ConnectionError> for ApiError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::Database(e) => ApiError::Storage(e),
            ConnectionError::RecipientNotFound => {
                ApiError::NotFound("recipient not found".to_string())
            }
            ConnectionError::SelfConnection => ApiError::InvalidArgument(
                "cannot send a connection request to yourself".to_string(),
            ),
            ConnectionError::QuotaExceeded { resets_at } => {
                ApiError::QuotaExceeded { resets_at }
            }
            ConnectionError::DuplicateRequest => ApiError::DuplicateRequest,
            ConnectionError::RequestNotFound => {
                ApiError::NotFound("connection request not found".to_string())
            }
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::Database(e) => ApiError::Storage(e),
            // A secret that fails to parse is our configuration fault, not
            // the caller's.
            WebhookError::MalformedSecret => {
                ApiError::Misconfigured("webhook secret is malformed".to_string())
            }
            other => ApiError::InvalidArgument(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::DuplicateRequest => StatusCode::CONFLICT,
            ApiError::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Storage details never leak to the client.
            ApiError::Storage(e) => {
                error!(error = %e, "storage operation failed");
                "storage unavailable".to_string()
            }
            ApiError::Misconfigured(detail) => {
                error!(detail = %detail, "server misconfiguration");
                "internal server error".to_string()
            }
            ApiError::QuotaExceeded { resets_at } => format!(
                "weekly connection limit reached, resets at {}",
                resets_at.to_rfc3339()
            ),
            other => other.to_string(),
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Unauthenticated.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::InvalidArgument("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::QuotaExceeded {
                resets_at: Utc::now()
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(ApiError::DuplicateRequest.status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Storage(sqlx::Error::PoolClosed).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_webhook_error_mapping() {
        // A bad secret is a server fault, never a 4xx back to the sender.
        let err: ApiError = WebhookError::MalformedSecret.into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: ApiError = WebhookError::InvalidSignature.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = WebhookError::StaleTimestamp.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_connection_error_mapping() {
        let err: ApiError = ConnectionError::DuplicateRequest.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = ConnectionError::RequestNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = ConnectionError::QuotaExceeded {
            resets_at: Utc::now(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
