use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Lifecycle of a connection request. Transitions exactly once from
/// `pending` to a terminal state.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
    Default,
)]
#[sqlx(type_name = "connection_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

/// What a recipient may do with a pending request.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RespondAction {
    Accept,
    Decline,
}

/// A directed connection proposal from one user to another.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Connection {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub message: Option<String>,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending request joined with its requester's public profile.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PendingRequestRow {
    pub id: Uuid,
    pub message: Option<String>,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub requester_id: Uuid,
    pub requester_name: String,
    pub requester_growth_points: i64,
    pub requester_engagement_level: i64,
}

/// An accepted connection joined with the counterpart's public profile.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ActiveConnectionRow {
    pub id: Uuid,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub counterpart_id: Uuid,
    pub counterpart_name: String,
    pub counterpart_growth_points: i64,
    pub counterpart_engagement_level: i64,
}

const CONNECTION_COLUMNS: &str =
    "id, requester_id, recipient_id, message, status, created_at, updated_at";

impl Connection {
    /// Canonical key for the unordered pair of users. A unique index on this
    /// column enforces at-most-one connection row per pair.
    pub fn pair_key(a: Uuid, b: Uuid) -> String {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        format!("{lo}:{hi}")
    }

    pub async fn create(
        pool: &SqlitePool,
        requester_id: Uuid,
        recipient_id: Uuid,
        message: Option<&str>,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query_as::<_, Connection>(&format!(
            "INSERT INTO connections (id, requester_id, recipient_id, pair_key, message, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {CONNECTION_COLUMNS}"
        ))
        .bind(id)
        .bind(requester_id)
        .bind(recipient_id)
        .bind(Self::pair_key(requester_id, recipient_id))
        .bind(message)
        .bind(ConnectionStatus::Pending)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Connection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Any connection row between the two users, regardless of direction or
    /// status.
    pub async fn find_for_pair(
        pool: &SqlitePool,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Connection>(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE pair_key = $1"
        ))
        .bind(Self::pair_key(a, b))
        .fetch_optional(pool)
        .await
    }

    /// Number of requests this user created strictly after the cutoff, in
    /// any status. The window is open at the cutoff so a request ages out
    /// exactly when the reported reset instant passes.
    pub async fn count_created_since(
        pool: &SqlitePool,
        requester_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM connections
             WHERE requester_id = $1 AND datetime(created_at) > datetime($2)",
        )
        .bind(requester_id)
        .bind(cutoff)
        .fetch_one(pool)
        .await
    }

    /// Oldest request creation time inside the window, used to report when
    /// the quota frees up again.
    pub async fn earliest_created_since(
        pool: &SqlitePool,
        requester_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MIN(created_at) FROM connections
             WHERE requester_id = $1 AND datetime(created_at) > datetime($2)",
        )
        .bind(requester_id)
        .bind(cutoff)
        .fetch_one(pool)
        .await
    }

    /// Conditionally resolve a pending request. Returns `None` when the
    /// request does not exist, belongs to someone else, or is already
    /// resolved. The status guard makes double resolution lose atomically.
    pub async fn resolve(
        pool: &SqlitePool,
        id: Uuid,
        recipient_id: Uuid,
        status: ConnectionStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Connection>(&format!(
            "UPDATE connections SET status = $1, updated_at = $2
             WHERE id = $3 AND recipient_id = $4 AND status = $5
             RETURNING {CONNECTION_COLUMNS}"
        ))
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .bind(recipient_id)
        .bind(ConnectionStatus::Pending)
        .fetch_optional(pool)
        .await
    }

    /// Pending requests addressed to the user, newest first.
    pub async fn pending_for_recipient(
        pool: &SqlitePool,
        recipient_id: Uuid,
    ) -> Result<Vec<PendingRequestRow>, sqlx::Error> {
        sqlx::query_as::<_, PendingRequestRow>(
            "SELECT c.id, c.message, c.status, c.created_at,
                    u.id AS requester_id,
                    u.anonymous_name AS requester_name,
                    u.growth_points AS requester_growth_points,
                    u.engagement_level AS requester_engagement_level
             FROM connections c
             JOIN users u ON u.id = c.requester_id
             WHERE c.recipient_id = $1 AND c.status = $2
             ORDER BY datetime(c.created_at) DESC",
        )
        .bind(recipient_id)
        .bind(ConnectionStatus::Pending)
        .fetch_all(pool)
        .await
    }

    /// Accepted connections involving the user in either direction, most
    /// recently updated first, joined with the counterpart profile.
    pub async fn accepted_for_user(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Vec<ActiveConnectionRow>, sqlx::Error> {
        sqlx::query_as::<_, ActiveConnectionRow>(
            "SELECT c.id, c.status, c.created_at, c.updated_at,
                    u.id AS counterpart_id,
                    u.anonymous_name AS counterpart_name,
                    u.growth_points AS counterpart_growth_points,
                    u.engagement_level AS counterpart_engagement_level
             FROM connections c
             JOIN users u
               ON u.id = CASE WHEN c.requester_id = $1 THEN c.recipient_id ELSE c.requester_id END
             WHERE (c.requester_id = $1 OR c.recipient_id = $1) AND c.status = $2
             ORDER BY datetime(c.updated_at) DESC",
        )
        .bind(user_id)
        .bind(ConnectionStatus::Accepted)
        .fetch_all(pool)
        .await
    }
}
