use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{Extensions, HeaderMap, Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    cache::{CacheStore, RateLimitCacheOperations},
    config::Config,
    error::AppError,
};

/// 需要单独限流的敏感操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensitiveAction {
    Login,
    Signup,
    ChangePassword,
    ChangeUsername,
    DeleteAccount,
}

impl SensitiveAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitiveAction::Login => "login",
            SensitiveAction::Signup => "signup",
            SensitiveAction::ChangePassword => "change_password",
            SensitiveAction::ChangeUsername => "change_username",
            SensitiveAction::DeleteAccount => "delete_account",
        }
    }
}

const GLOBAL_SCOPE: &str = "global";

#[derive(Clone)]
pub struct RateLimiter {
    cache: Arc<dyn CacheStore>,
    config: Arc<Config>,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn CacheStore>, config: Arc<Config>) -> Self {
        Self { cache, config }
    }

    async fn exceeded(
        &self,
        scope: &str,
        ip: &str,
        limit: u32,
        window: Duration,
    ) -> Result<bool, AppError> {
        let count = RateLimitCacheOperations::hit(self.cache.as_ref(), scope, ip, window).await?;
        Ok(count > u64::from(limit))
    }

    /// 每个敏感操作按 IP 单独计数
    pub async fn enforce(&self, ip: &str, action: SensitiveAction) -> Result<(), AppError> {
        let exceeded = self
            .exceeded(
                action.as_str(),
                ip,
                self.config.action_rate_limit_attempts,
                self.config.action_rate_limit_window(),
            )
            .await?;

        if exceeded {
            tracing::warn!("Rate limit exceeded for {} from {}", action.as_str(), ip);
            return Err(AppError::RateLimited);
        }
        Ok(())
    }

    pub async fn check_rate_limit(self: Arc<Self>, mut req: Request<Body>, next: Next) -> Response {
        let ip = client_ip(
            req.headers(),
            req.extensions(),
            self.config.trust_proxy_headers,
        );
        req.extensions_mut().insert(ClientIp(ip.clone()));

        match self
            .exceeded(
                GLOBAL_SCOPE,
                &ip,
                self.config.rate_limit_requests,
                self.config.rate_limit_window(),
            )
            .await
        {
            Ok(false) => next.run(req).await,
            Ok(true) => {
                tracing::debug!("Global rate limit exceeded for {}", ip);
                AppError::RateLimited.into_response()
            }
            Err(e) => e.into_response(),
        }
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}

/// 请求方IP
///
/// 只有信任反向代理时才读取 `x-real-ip`，其次 `x-forwarded-for` 的第一项；
/// 否则一律使用连接的对端地址，客户端自带的请求头不影响限流计数。
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy_headers: bool) -> String {
    let forwarded = trust_proxy_headers
        .then(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .filter(|ip| !ip.trim().is_empty())
                .or_else(|| {
                    headers
                        .get("x-forwarded-for")
                        .and_then(|h| h.to_str().ok())
                        .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
                })
        })
        .flatten();

    match forwarded {
        Some(ip) => ip.trim().to_string(),
        None => extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    }
}

/// 请求方IP，由限流中间件解析后放入请求扩展
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ClientIp>()
            .cloned()
            .unwrap_or_else(|| ClientIp(client_ip(&parts.headers, &parts.extensions, false))))
    }
}
