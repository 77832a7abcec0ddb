use std::time::Duration;

use crate::cache::CacheStore;
use crate::cache::keys::rate_limit_key;
use crate::database::StoreError;

/// 速率限制缓存操作
pub struct RateLimitCacheOperations;

impl RateLimitCacheOperations {
    /// 记录一次请求，返回窗口内的累计次数
    pub async fn hit(
        cache: &dyn CacheStore,
        scope: &str,
        ip: &str,
        window: Duration,
    ) -> Result<u64, StoreError> {
        cache.increment(&rate_limit_key(scope, ip), window).await
    }
}
