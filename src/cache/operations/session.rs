use std::time::Duration;

use crate::cache::CacheStore;
use crate::cache::keys::revoked_session_key;
use crate::database::StoreError;
use crate::utils::Claims;

/// 会话缓存操作
///
/// 会话本身是无状态的 JWT，这里只记录被注销的令牌ID，保留到令牌自然过期。
pub struct SessionCacheOperations;

impl SessionCacheOperations {
    /// 吊销会话
    pub async fn revoke(cache: &dyn CacheStore, claims: &Claims) -> Result<(), StoreError> {
        let ttl = Duration::from_secs(claims.remaining_secs());
        cache.set_ex(&revoked_session_key(&claims.jti), &claims.sub, ttl).await
    }

    /// 会话是否已被吊销
    pub async fn is_revoked(cache: &dyn CacheStore, jti: &str) -> Result<bool, StoreError> {
        cache.exists(&revoked_session_key(jti)).await
    }
}
