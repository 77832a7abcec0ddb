use std::time::Duration;

use uuid::Uuid;

use crate::cache::CacheStore;
use crate::cache::keys::{email_confirmation_key, oauth_state_key};
use crate::cache::models::{CachedEmailConfirmation, CachedOAuthState};
use crate::database::StoreError;
use crate::utils::{digest_token, generate_one_time_token};

/// OAuth state 有效期
pub const OAUTH_STATE_TTL: Duration = Duration::from_secs(600);

/// 邮箱确认链接有效期
pub const EMAIL_CONFIRMATION_TTL: Duration = Duration::from_secs(24 * 3600);

/// 一次性令牌缓存操作
pub struct TokenCacheOperations;

impl TokenCacheOperations {
    /// 生成并缓存 OAuth state，返回明文 state
    pub async fn issue_oauth_state(
        cache: &dyn CacheStore,
        provider: &str,
    ) -> Result<String, StoreError> {
        let state = generate_one_time_token();
        let cached = CachedOAuthState {
            provider: provider.to_string(),
            created_at: chrono::Utc::now().timestamp(),
        };

        let json = serde_json::to_string(&cached)?;
        cache
            .set_ex(&oauth_state_key(&digest_token(&state)), &json, OAUTH_STATE_TTL)
            .await?;

        Ok(state)
    }

    /// 取出 OAuth state，只能使用一次
    pub async fn take_oauth_state(
        cache: &dyn CacheStore,
        state: &str,
    ) -> Result<Option<CachedOAuthState>, StoreError> {
        match cache.take(&oauth_state_key(&digest_token(state))).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// 生成并缓存邮箱确认令牌，返回明文令牌
    pub async fn issue_email_confirmation(
        cache: &dyn CacheStore,
        user_id: Uuid,
        email: &str,
    ) -> Result<String, StoreError> {
        let token = generate_one_time_token();
        let cached = CachedEmailConfirmation {
            user_id,
            email: email.to_string(),
        };

        let json = serde_json::to_string(&cached)?;
        cache
            .set_ex(
                &email_confirmation_key(&digest_token(&token)),
                &json,
                EMAIL_CONFIRMATION_TTL,
            )
            .await?;

        Ok(token)
    }

    /// 取出邮箱确认令牌，只能使用一次
    pub async fn take_email_confirmation(
        cache: &dyn CacheStore,
        token: &str,
    ) -> Result<Option<CachedEmailConfirmation>, StoreError> {
        match cache.take(&email_confirmation_key(&digest_token(token))).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
