mod auth;
mod error_handler;
mod rate_limit;

pub use auth::{
    CurrentSession, SESSION_COOKIE, Session, auth_middleware, clear_session_cookie, session_cookie,
};
pub use error_handler::log_errors;
pub use rate_limit::{ClientIp, RateLimiter, SensitiveAction, client_ip, rate_limit};
