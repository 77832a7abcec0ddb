// 数据库模块
// 包含数据库实体定义和存储库接口及其 Postgres 实现

pub mod models;
pub mod repositories;

use thiserror::Error;

pub use models::comment::{Comment, CommentAuthor, CommentRow, NewComment};
pub use models::profile::{NewProfile, NotificationPreferences, Profile, ProfileUpdate};
pub use models::user::{AuthUser, Identity, NewAuthUser};
pub use repositories::auth::{AuthRepository, MAX_USERNAME_ATTEMPTS, PgAuthRepository};
pub use repositories::comment::{CommentRepository, PgCommentRepository};
pub use repositories::profile::{PgProfileRepository, ProfileRepository};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    EmailTaken,

    #[error("username already taken")]
    UsernameTaken,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

/// 把唯一约束冲突翻译为具体的业务错误
pub(crate) fn map_unique_violation(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some("auth_users_email_key") => return StoreError::EmailTaken,
                Some("profiles_username_key") => return StoreError::UsernameTaken,
                _ => {}
            }
        }
    }
    StoreError::Database(err)
}
