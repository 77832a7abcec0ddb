use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::models::profile::NewProfile;
use crate::database::models::user::{AuthUser, Identity, NewAuthUser};
use crate::database::{StoreError, map_unique_violation};
use crate::oauth::OAuthProfile;

/// 第三方登录自动追加数字后缀的最大尝试次数
pub const MAX_USERNAME_ATTEMPTS: u32 = 50;

/// 认证用户存储
///
/// 创建用户时会在同一事务内生成对应的 `profiles` 行。
#[async_trait]
pub trait AuthRepository: Send + Sync {
    /// 邮箱密码注册
    async fn sign_up(&self, user: NewAuthUser) -> Result<AuthUser, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<AuthUser>, StoreError>;

    async fn confirm_email(&self, id: Uuid) -> Result<(), StoreError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    /// 删除用户，资料、身份和评论随外键级联删除
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;

    async fn identities(&self, user_id: Uuid) -> Result<Vec<Identity>, StoreError>;

    /// OAuth 登录：按身份查找，其次按邮箱关联，都没有则新建用户
    async fn sign_in_with_identity(&self, profile: &OAuthProfile) -> Result<AuthUser, StoreError>;
}

/// 用户存储库实现
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthRepository for PgAuthRepository {
    async fn sign_up(&self, user: NewAuthUser) -> Result<AuthUser, StoreError> {
        let mut tx = self.pool.begin().await?;

        let created = insert_user(&mut *tx, &user).await?;
        // 用户自己填写的用户名被占用时直接报错，不改名
        provision_profile(&mut *tx, &created, 1).await?;

        tx.commit().await?;
        tracing::info!("Created user {}", created.id);
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AuthUser>, StoreError> {
        let user = sqlx::query_as::<_, AuthUser>(
            r#"
            SELECT id, email, password_hash, raw_user_meta_data, email_confirmed_at, created_at
            FROM auth_users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<AuthUser>, StoreError> {
        let user = sqlx::query_as::<_, AuthUser>(
            r#"
            SELECT id, email, password_hash, raw_user_meta_data, email_confirmed_at, created_at
            FROM auth_users
            WHERE email = $1
            "#,
        )
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn confirm_email(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE auth_users
            SET email_confirmed_at = COALESCE(email_confirmed_at, NOW())
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE auth_users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM auth_users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user"));
        }
        tracing::info!("Deleted user {}", id);
        Ok(())
    }

    async fn identities(&self, user_id: Uuid) -> Result<Vec<Identity>, StoreError> {
        let identities = sqlx::query_as::<_, Identity>(
            r#"
            SELECT user_id, provider, provider_user_id, identity_data, created_at
            FROM auth_identities
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(identities)
    }

    async fn sign_in_with_identity(&self, profile: &OAuthProfile) -> Result<AuthUser, StoreError> {
        let mut tx = self.pool.begin().await?;
        let provider = profile.provider.as_str();

        let linked = sqlx::query_as::<_, AuthUser>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.raw_user_meta_data, u.email_confirmed_at, u.created_at
            FROM auth_users u
            JOIN auth_identities i ON i.user_id = u.id
            WHERE i.provider = $1 AND i.provider_user_id = $2
            "#,
        )
        .bind(provider)
        .bind(&profile.provider_user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(user) = linked {
            sqlx::query(
                r#"
                UPDATE auth_identities
                SET identity_data = $1
                WHERE provider = $2 AND provider_user_id = $3
                "#,
            )
            .bind(Json(&profile.metadata))
            .bind(provider)
            .bind(&profile.provider_user_id)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            return Ok(user);
        }

        // 未确认邮箱的密码账号可能不是邮箱主人注册的，关联前清除其密码
        let existing = sqlx::query_as::<_, AuthUser>(
            r#"
            UPDATE auth_users
            SET password_hash = CASE WHEN email_confirmed_at IS NULL THEN NULL ELSE password_hash END,
                email_confirmed_at = COALESCE(email_confirmed_at, NOW())
            WHERE email = $1
            RETURNING id, email, password_hash, raw_user_meta_data, email_confirmed_at, created_at
            "#,
        )
        .bind(profile.email.to_lowercase())
        .fetch_optional(&mut *tx)
        .await?;

        let user = match existing {
            Some(user) => {
                tracing::info!("Linking {} identity to existing user {}", provider, user.id);
                user
            }
            None => {
                let new_user = NewAuthUser {
                    email: profile.email.clone(),
                    password_hash: None,
                    metadata: profile.metadata.clone(),
                    email_confirmed: true,
                };
                let created = insert_user(&mut *tx, &new_user).await?;
                provision_profile(&mut *tx, &created, MAX_USERNAME_ATTEMPTS).await?;
                tracing::info!("Created user {} from {} sign-in", created.id, provider);
                created
            }
        };

        sqlx::query(
            r#"
            INSERT INTO auth_identities (user_id, provider, provider_user_id, identity_data)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id)
        .bind(provider)
        .bind(&profile.provider_user_id)
        .bind(Json(&profile.metadata))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }
}

async fn insert_user(conn: &mut PgConnection, user: &NewAuthUser) -> Result<AuthUser, StoreError> {
    sqlx::query_as::<_, AuthUser>(
        r#"
        INSERT INTO auth_users (email, password_hash, raw_user_meta_data, email_confirmed_at)
        VALUES ($1, $2, $3, CASE WHEN $4 THEN NOW() ELSE NULL END)
        RETURNING id, email, password_hash, raw_user_meta_data, email_confirmed_at, created_at
        "#,
    )
    .bind(user.email.to_lowercase())
    .bind(&user.password_hash)
    .bind(Json(&user.metadata))
    .bind(user.email_confirmed)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_unique_violation)
}

/// 新用户的资料行，用户名冲突时追加数字后缀，最多尝试 `max_attempts` 个候选
async fn provision_profile(
    conn: &mut PgConnection,
    user: &AuthUser,
    max_attempts: u32,
) -> Result<(), StoreError> {
    let profile = NewProfile::from_user_metadata(user.id, &user.email, &user.raw_user_meta_data);

    for attempt in 0..max_attempts {
        let username = profile.username_candidate(attempt);
        let inserted = sqlx::query_scalar::<_, uuid::Uuid>(
            r#"
            INSERT INTO profiles (id, username, display_name, avatar_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(profile.id)
        .bind(&username)
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .fetch_optional(&mut *conn)
        .await?;

        if inserted.is_some() {
            if attempt > 0 {
                tracing::debug!("Username {} was taken, provisioned {}", profile.username, username);
            }
            return Ok(());
        }
    }

    Err(StoreError::UsernameTaken)
}
