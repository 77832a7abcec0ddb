use std::sync::{Arc, Mutex};

use config::Config;

pub mod cache;
pub mod comments;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod oauth;
pub mod result;
pub mod routes;
pub mod utils;
pub mod validation;
pub mod views;

#[cfg(test)]
mod test_support;

use cache::CacheStore;
use comments::{ThreadCache, ThreadRenderer};
use database::{AuthRepository, CommentRepository, ProfileRepository};
use middleware::RateLimiter;
use oauth::OAuthExchange;
use views::Views;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<dyn AuthRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub cache: Arc<dyn CacheStore>,
    pub oauth: Arc<dyn OAuthExchange>,
    pub rate_limiter: Arc<RateLimiter>,
    pub views: Arc<Views>,
    pub threads: Arc<ThreadCache>,
    pub renderer: Arc<Mutex<ThreadRenderer>>,
}

impl AppState {
    pub fn new(
        config: Config,
        auth: Arc<dyn AuthRepository>,
        profiles: Arc<dyn ProfileRepository>,
        comments: Arc<dyn CommentRepository>,
        cache: Arc<dyn CacheStore>,
        oauth: Arc<dyn OAuthExchange>,
    ) -> Result<Self, minijinja::Error> {
        let config = Arc::new(config);
        let rate_limiter = Arc::new(RateLimiter::new(cache.clone(), config.clone()));

        Ok(Self {
            config,
            auth,
            profiles,
            comments,
            cache,
            oauth,
            rate_limiter,
            views: Arc::new(Views::new()?),
            threads: Arc::new(ThreadCache::default()),
            renderer: Arc::new(Mutex::new(ThreadRenderer::new())),
        })
    }
}
