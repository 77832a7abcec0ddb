use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// 认证用户，对应 auth_users 表
#[derive(Debug, Clone, FromRow)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub raw_user_meta_data: Json<serde_json::Value>,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AuthUser {
    /// 仅通过 OAuth 注册的账号没有密码
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewAuthUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub metadata: serde_json::Value,
    pub email_confirmed: bool,
}

/// 已关联的第三方登录身份
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Identity {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_user_id: String,
    pub identity_data: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
