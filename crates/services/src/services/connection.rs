//! The connection quota manager: weekly limit enforcement and the
//! request lifecycle (pending -> accepted/declined).

use chrono::{DateTime, Duration, Utc};
use db::models::{
    connection::{
        ActiveConnectionRow, Connection, ConnectionStatus, PendingRequestRow, RespondAction,
    },
    user::{User, UserPublic},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::notification::NotificationService;

/// Successful new connection requests a user may initiate per rolling week.
pub const WEEKLY_CONNECTION_LIMIT: i64 = 1;

/// Length of the rolling quota window.
pub const QUOTA_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("recipient not found")]
    RecipientNotFound,
    #[error("cannot send a connection request to yourself")]
    SelfConnection,
    #[error("weekly connection limit reached")]
    QuotaExceeded { resets_at: DateTime<Utc> },
    #[error("connection request already exists")]
    DuplicateRequest,
    #[error("connection request not found")]
    RequestNotFound,
}

/// A pending request as returned to the recipient.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PendingRequest {
    pub id: Uuid,
    pub requester: UserPublic,
    pub message: Option<String>,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
}

impl From<PendingRequestRow> for PendingRequest {
    fn from(row: PendingRequestRow) -> Self {
        Self {
            id: row.id,
            requester: UserPublic {
                id: row.requester_id,
                anonymous_name: row.requester_name,
                growth_points: row.requester_growth_points,
                engagement_level: row.requester_engagement_level,
            },
            message: row.message,
            status: row.status,
            created_at: row.created_at,
        }
    }
}

/// An accepted connection as seen by one of its two members.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ActiveConnection {
    pub id: Uuid,
    #[serde(rename = "otherUser")]
    pub other_user: UserPublic,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ActiveConnectionRow> for ActiveConnection {
    fn from(row: ActiveConnectionRow) -> Self {
        Self {
            id: row.id,
            other_user: UserPublic {
                id: row.counterpart_id,
                anonymous_name: row.counterpart_name,
                growth_points: row.counterpart_growth_points,
                engagement_level: row.counterpart_engagement_level,
            },
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Weekly quota snapshot for a user.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyQuota {
    pub limit: i64,
    pub used: i64,
    /// When the oldest in-window request ages out and the quota frees up.
    pub resets_at: Option<DateTime<Utc>>,
}

/// Stateless manager over the store. Invoked per-request; holds no
/// in-process state between calls, so concurrent process instances stay
/// consistent through the store alone.
pub struct ConnectionService;

impl ConnectionService {
    /// Create a new pending connection request from `requester` to
    /// `recipient_id`.
    ///
    /// The quota check and the insert are two store round-trips, so two
    /// concurrent requests from the same user can both pass the check and
    /// over-grant the weekly quota by one. The rolling window has no natural
    /// uniqueness bucket to close this at the store; the duplicate-pair race
    /// is closed by the `pair_key` unique index.
    pub async fn request_connection(
        pool: &SqlitePool,
        notifier: &NotificationService,
        requester: &User,
        recipient_id: Uuid,
        message: Option<&str>,
    ) -> Result<Connection, ConnectionError> {
        if recipient_id == requester.id {
            return Err(ConnectionError::SelfConnection);
        }

        let recipient = User::find_by_id(pool, recipient_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(ConnectionError::RecipientNotFound)?;

        let quota = Self::weekly_quota(pool, requester.id).await?;
        if quota.used >= quota.limit {
            return Err(ConnectionError::QuotaExceeded {
                resets_at: quota.resets_at.unwrap_or_else(|| {
                    Utc::now() + Duration::days(QUOTA_WINDOW_DAYS)
                }),
            });
        }

        if Connection::find_for_pair(pool, requester.id, recipient.id)
            .await?
            .is_some()
        {
            return Err(ConnectionError::DuplicateRequest);
        }

        let connection = Connection::create(pool, requester.id, recipient.id, message)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db_err)
                    if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
                {
                    ConnectionError::DuplicateRequest
                }
                _ => ConnectionError::Database(e),
            })?;

        info!(
            connection_id = %connection.id,
            requester_id = %requester.id,
            recipient_id = %recipient.id,
            "connection request created"
        );

        notifier
            .connection_request_received(recipient.id, &requester.anonymous_name, connection.id)
            .await;

        Ok(connection)
    }

    /// Accept or decline a pending request addressed to `responder`.
    ///
    /// A request that does not exist, belongs to someone else, or was
    /// already resolved all surface as `RequestNotFound`; the conditional
    /// update makes a second resolution lose atomically.
    pub async fn respond_to_request(
        pool: &SqlitePool,
        notifier: &NotificationService,
        responder: &User,
        request_id: Uuid,
        action: RespondAction,
    ) -> Result<ConnectionStatus, ConnectionError> {
        let status = match action {
            RespondAction::Accept => ConnectionStatus::Accepted,
            RespondAction::Decline => ConnectionStatus::Declined,
        };

        let connection = Connection::resolve(pool, request_id, responder.id, status)
            .await?
            .ok_or(ConnectionError::RequestNotFound)?;

        info!(
            connection_id = %connection.id,
            responder_id = %responder.id,
            status = %connection.status,
            "connection request resolved"
        );

        if connection.status == ConnectionStatus::Accepted {
            notifier
                .connection_accepted(
                    connection.requester_id,
                    &responder.anonymous_name,
                    connection.id,
                )
                .await;
        }

        Ok(connection.status)
    }

    /// Pending requests addressed to the user, newest first.
    pub async fn pending_requests(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Vec<PendingRequest>, ConnectionError> {
        let rows = Connection::pending_for_recipient(pool, user_id).await?;
        Ok(rows.into_iter().map(PendingRequest::from).collect())
    }

    /// Accepted connections involving the user, most recently updated first.
    pub async fn active_connections(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Vec<ActiveConnection>, ConnectionError> {
        let rows = Connection::accepted_for_user(pool, user_id).await?;
        Ok(rows.into_iter().map(ActiveConnection::from).collect())
    }

    /// Active users the caller could still send a request to.
    pub async fn potential_connections(
        pool: &SqlitePool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<UserPublic>, ConnectionError> {
        let users = User::find_potential_counterparts(pool, user_id, limit).await?;
        Ok(users.into_iter().map(UserPublic::from).collect())
    }

    /// Usage of the rolling 7-day window, derived from the request records
    /// themselves. There is no stored counter to reset; a request stops
    /// counting once it ages past the window.
    pub async fn weekly_quota(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<WeeklyQuota, ConnectionError> {
        let cutoff = Utc::now() - Duration::days(QUOTA_WINDOW_DAYS);
        let used = Connection::count_created_since(pool, user_id, cutoff).await?;
        let resets_at = if used > 0 {
            Connection::earliest_created_since(pool, user_id, cutoff)
                .await?
                .map(|t| t + Duration::days(QUOTA_WINDOW_DAYS))
        } else {
            None
        };

        Ok(WeeklyQuota {
            limit: WEEKLY_CONNECTION_LIMIT,
            used,
            resets_at,
        })
    }
}
