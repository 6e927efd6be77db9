use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// A learner account. Provisioned by the identity-provider webhook, never
/// hard-deleted (deactivation only).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    /// Opaque subject identifier assigned by the identity provider.
    pub external_id: String,
    pub email: String,
    pub anonymous_name: String,
    pub growth_points: i64,
    pub engagement_level: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

/// Fields of a user that are visible to other users.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UserPublic {
    pub id: Uuid,
    pub anonymous_name: String,
    pub growth_points: i64,
    pub engagement_level: i64,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            anonymous_name: user.anonymous_name,
            growth_points: user.growth_points,
            engagement_level: user.engagement_level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateUser {
    pub external_id: String,
    pub email: String,
    pub anonymous_name: String,
}

const USER_COLUMNS: &str = "id, external_id, email, anonymous_name, growth_points, \
     engagement_level, is_active, created_at, updated_at, last_active_at";

impl User {
    pub async fn create(pool: &SqlitePool, data: &CreateUser) -> Result<Self, sqlx::Error> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, external_id, email, anonymous_name, created_at, updated_at, last_active_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&data.external_id)
        .bind(&data.email)
        .bind(&data.anonymous_name)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_external_id(
        pool: &SqlitePool,
        external_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(pool)
        .await
    }

    /// Active users the given user has no connection history with, newest
    /// accounts first.
    pub async fn find_potential_counterparts(
        pool: &SqlitePool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users u
             WHERE u.id != $1
               AND u.is_active = 1
               AND NOT EXISTS (
                   SELECT 1 FROM connections c
                   WHERE (c.requester_id = u.id AND c.recipient_id = $1)
                      OR (c.recipient_id = u.id AND c.requester_id = $1)
               )
             ORDER BY datetime(u.created_at) DESC
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn touch_last_active(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_active_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_active(
        pool: &SqlitePool,
        id: Uuid,
        is_active: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET is_active = $1, updated_at = $2 WHERE id = $3
             RETURNING {USER_COLUMNS}"
        ))
        .bind(is_active)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    async fn seed(pool: &SqlitePool, external_id: &str) -> User {
        User::create(
            pool,
            &CreateUser {
                external_id: external_id.to_string(),
                email: format!("{external_id}@example.com"),
                anonymous_name: format!("User-{external_id}"),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_find_by_external_id() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = seed(&db.pool, "idp_123").await;

        let found = User::find_by_external_id(&db.pool, "idp_123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.growth_points, 0);
        assert!(found.is_active);

        assert!(
            User::find_by_external_id(&db.pool, "idp_missing")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_external_id_is_unique() {
        let db = DBService::new_in_memory().await.unwrap();
        seed(&db.pool, "idp_dup").await;

        let err = User::create(
            &db.pool,
            &CreateUser {
                external_id: "idp_dup".to_string(),
                email: "other@example.com".to_string(),
                anonymous_name: "Other".to_string(),
            },
        )
        .await
        .unwrap_err();

        match err {
            sqlx::Error::Database(db_err) => {
                assert!(matches!(
                    db_err.kind(),
                    sqlx::error::ErrorKind::UniqueViolation
                ));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_set_active() {
        let db = DBService::new_in_memory().await.unwrap();
        let user = seed(&db.pool, "idp_active").await;

        let updated = User::set_active(&db.pool, user.id, false)
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.is_active);

        assert!(
            User::set_active(&db.pool, Uuid::new_v4(), false)
                .await
                .unwrap()
                .is_none()
        );
    }
}
