use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::database::models::profile::{NotificationPreferences, Profile, ProfileUpdate};
use crate::database::{StoreError, map_unique_violation};

/// 用户资料存储，所有写操作都按资料 ID 过滤
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, StoreError>;

    /// 用户名是否已被（除 `except` 之外的）其他用户占用
    async fn username_taken(&self, username: &str, except: Option<Uuid>) -> Result<bool, StoreError>;

    async fn update_username(&self, id: Uuid, username: &str) -> Result<Profile, StoreError>;

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Profile, StoreError>;

    async fn update_notification_preferences(
        &self,
        id: Uuid,
        preferences: NotificationPreferences,
    ) -> Result<Profile, StoreError>;
}

#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, username, display_name, bio, avatar_url, notification_preferences, updated_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    async fn username_taken(&self, username: &str, except: Option<Uuid>) -> Result<bool, StoreError> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM profiles
                WHERE username = $1 AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(username)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn update_username(&self, id: Uuid, username: &str) -> Result<Profile, StoreError> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET username = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, username, display_name, bio, avatar_url, notification_preferences, updated_at
            "#,
        )
        .bind(username)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_violation)?
        .ok_or(StoreError::NotFound("profile"))
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Profile, StoreError> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET display_name = $1, bio = $2, avatar_url = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING id, username, display_name, bio, avatar_url, notification_preferences, updated_at
            "#,
        )
        .bind(&update.display_name)
        .bind(&update.bio)
        .bind(&update.avatar_url)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("profile"))
    }

    async fn update_notification_preferences(
        &self,
        id: Uuid,
        preferences: NotificationPreferences,
    ) -> Result<Profile, StoreError> {
        sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET notification_preferences = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, username, display_name, bio, avatar_url, notification_preferences, updated_at
            "#,
        )
        .bind(Json(preferences))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("profile"))
    }
}
