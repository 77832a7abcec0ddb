// 缓存模块
// 限流计数、会话吊销、OAuth state 与邮箱确认令牌都存放在 Redis 中

pub mod keys;
pub mod models;
pub mod operations;
mod store;

pub use operations::{RateLimitCacheOperations, SessionCacheOperations, TokenCacheOperations};
pub use store::{CacheStore, RedisCache};
