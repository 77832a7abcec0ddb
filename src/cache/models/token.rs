use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OAuth 授权请求发出时记录的 state
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CachedOAuthState {
    pub provider: String,
    pub created_at: i64, // Unix timestamp
}

/// 注册后等待确认的邮箱
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CachedEmailConfirmation {
    pub user_id: Uuid,
    pub email: String,
}
