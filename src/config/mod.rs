use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub action_rate_limit_attempts: u32,
    pub action_rate_limit_window_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    /// OAuth 回调地址的前缀，缺失时 OAuth 登录直接跳转到错误页
    pub site_url: Option<String>,
    pub github: Option<OAuthCredentials>,
    pub google: Option<OAuthCredentials>,
    pub require_email_confirmation: bool,
    pub secure_cookies: bool,
    /// 部署在反向代理之后时才读取 `x-real-ip` / `x-forwarded-for`
    pub trust_proxy_headers: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = optional("JWT_EXPIRATION")
            .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
            .unwrap_or(24);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: parse_or("SERVER_PORT", 3000),
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parse_or("RATE_LIMIT_REQUESTS", 100),
            action_rate_limit_attempts: parse_or("ACTION_RATE_LIMIT_ATTEMPTS", 5),
            action_rate_limit_window_secs: parse_or("ACTION_RATE_LIMIT_WINDOW", 900),
            site_url: optional("SITE_URL").map(|url| url.trim_end_matches('/').to_string()),
            github: credentials("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
            google: credentials("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            require_email_confirmation: parse_or("REQUIRE_EMAIL_CONFIRMATION", true),
            secure_cookies: parse_or("SECURE_COOKIES", !cfg!(debug_assertions)),
            trust_proxy_headers: parse_or("TRUST_PROXY_HEADERS", false),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn action_rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.action_rate_limit_window_secs)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match optional(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {key} value {raw:?}, using default");
            default
        }),
        None => default,
    }
}

fn credentials(id_key: &str, secret_key: &str) -> Option<OAuthCredentials> {
    Some(OAuthCredentials {
        client_id: optional(id_key)?,
        client_secret: optional(secret_key)?,
    })
}
