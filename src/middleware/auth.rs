use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use uuid::Uuid;

use crate::{
    AppState,
    cache::SessionCacheOperations,
    config::Config,
    error::AppError,
    utils::{Claims, verify_token},
};

pub const SESSION_COOKIE: &str = "session";

/// 已登录用户
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    pub claims: Claims,
}

/// 解析会话并放入请求扩展，未登录的请求照常放行，由处理器决定如何响应
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = session_token(req.headers()) {
        if let Some(session) = resolve_session(&state, &token).await {
            req.extensions_mut().insert(session);
        }
    }
    next.run(req).await
}

/// 优先读取 cookie，其次是 `Authorization: Bearer`
fn session_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            headers
                .typed_get::<Authorization<Bearer>>()
                .map(|auth| auth.token().to_string())
        })
}

async fn resolve_session(state: &AppState, token: &str) -> Option<Session> {
    let claims = match verify_token(token, &state.config) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!("Rejected session token: {}", e);
            return None;
        }
    };

    match SessionCacheOperations::is_revoked(state.cache.as_ref(), &claims.jti).await {
        Ok(false) => {}
        Ok(true) => return None,
        Err(e) => {
            tracing::error!("Failed to check session revocation: {}", e);
            return None;
        }
    }

    Some(Session {
        user_id: claims.user_id()?,
        email: claims.email.clone(),
        claims,
    })
}

/// 当前请求的会话（可能未登录）
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Option<Session>);

impl CurrentSession {
    pub fn require(self) -> Result<Session, AppError> {
        self.0.ok_or(AppError::Unauthorized)
    }

    pub fn is_signed_in(&self) -> bool {
        self.0.is_some()
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentSession(parts.extensions.get::<Session>().cloned()))
    }
}

pub fn session_cookie(token: String, config: &Config) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies)
        .build()
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}
