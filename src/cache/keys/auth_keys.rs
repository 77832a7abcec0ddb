/// 限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 已吊销会话键前缀
const REVOKED_SESSION_PREFIX: &str = "session:revoked:";

/// OAuth state 键前缀
const OAUTH_STATE_PREFIX: &str = "oauth:state:";

/// 邮箱确认令牌键前缀
const EMAIL_CONFIRMATION_PREFIX: &str = "auth:confirm:";

/// 生成限流计数键，`scope` 为动作名或 `global`
pub fn rate_limit_key(scope: &str, ip: &str) -> String {
    format!("{}{}:{}", RATE_LIMIT_PREFIX, scope, ip)
}

/// 生成已吊销会话键
pub fn revoked_session_key(jti: &str) -> String {
    format!("{}{}", REVOKED_SESSION_PREFIX, jti)
}

/// 生成 OAuth state 键，参数为 state 的摘要
pub fn oauth_state_key(state_digest: &str) -> String {
    format!("{}{}", OAUTH_STATE_PREFIX, state_digest)
}

/// 生成邮箱确认令牌键，参数为令牌的摘要
pub fn email_confirmation_key(token_digest: &str) -> String {
    format!("{}{}", EMAIL_CONFIRMATION_PREFIX, token_digest)
}
