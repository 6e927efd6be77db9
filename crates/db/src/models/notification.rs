use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    ConnectionRequest,
    ConnectionAccepted,
}

/// A side-effect record informing a user of an event. Created best-effort;
/// the originating operation never fails on notification errors.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub related_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub related_id: Option<Uuid>,
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, body, related_id, is_read, created_at";

impl Notification {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateNotification,
    ) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (id, user_id, kind, title, body, related_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(data.user_id)
        .bind(data.kind)
        .bind(&data.title)
        .bind(&data.body)
        .bind(data.related_id)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_user(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications
             WHERE user_id = $1
             ORDER BY datetime(created_at) DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Mark one of the user's notifications as read. Returns `None` when the
    /// notification does not exist or belongs to someone else.
    pub async fn mark_read(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Notification>(&format!(
            "UPDATE notifications SET is_read = 1
             WHERE id = $1 AND user_id = $2
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService,
        models::user::{CreateUser, User},
    };

    async fn seed(pool: &SqlitePool, name: &str) -> User {
        User::create(
            pool,
            &CreateUser {
                external_id: format!("idp_{name}"),
                email: format!("{name}@example.com"),
                anonymous_name: name.to_string(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_mark_read_checks_ownership() {
        let db = DBService::new_in_memory().await.unwrap();
        let alice = seed(&db.pool, "alice").await;
        let bob = seed(&db.pool, "bob").await;

        let notif = Notification::create(
            &db.pool,
            &CreateNotification {
                user_id: alice.id,
                kind: NotificationKind::ConnectionRequest,
                title: "New Connection Request".to_string(),
                body: "bob wants to connect with you!".to_string(),
                related_id: None,
            },
        )
        .await
        .unwrap();
        assert!(!notif.is_read);

        // Not bob's notification.
        assert!(
            Notification::mark_read(&db.pool, notif.id, bob.id)
                .await
                .unwrap()
                .is_none()
        );

        let read = Notification::mark_read(&db.pool, notif.id, alice.id)
            .await
            .unwrap()
            .unwrap();
        assert!(read.is_read);
    }
}
