//! GitHub / Google OAuth 授权码流程

mod client;

use reqwest::Url;
use serde_json::Value;

use crate::config::{Config, OAuthCredentials};
use crate::error::AppError;

pub use client::{HttpOAuthClient, OAuthExchange};

pub const CALLBACK_PATH: &str = "/auth/callback";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Github,
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "github",
            OAuthProvider::Google => "google",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "github" => Some(OAuthProvider::Github),
            "google" => Some(OAuthProvider::Google),
            _ => None,
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "GitHub",
            OAuthProvider::Google => "Google",
        }
    }

    fn authorize_endpoint(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "https://github.com/login/oauth/authorize",
            OAuthProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
        }
    }

    fn scope(&self) -> &'static str {
        match self {
            OAuthProvider::Github => "read:user user:email",
            OAuthProvider::Google => "openid email profile",
        }
    }

    pub fn credentials<'a>(&self, config: &'a Config) -> Result<&'a OAuthCredentials, AppError> {
        let credentials = match self {
            OAuthProvider::Github => config.github.as_ref(),
            OAuthProvider::Google => config.google.as_ref(),
        };
        credentials.ok_or(AppError::ProviderNotConfigured(self.display_name()))
    }
}

/// 第三方返回的用户信息，`metadata` 的字段名与资料生成规则一致
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProfile {
    pub provider: OAuthProvider,
    pub provider_user_id: String,
    pub email: String,
    pub metadata: Value,
}

pub fn redirect_uri(site_url: &str) -> String {
    format!("{}{}", site_url.trim_end_matches('/'), CALLBACK_PATH)
}

/// 拼接授权跳转地址
pub fn authorize_url(
    provider: OAuthProvider,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> Result<String, AppError> {
    let mut params = vec![
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("response_type", "code"),
        ("scope", provider.scope()),
        ("state", state),
    ];
    if provider == OAuthProvider::Google {
        params.push(("access_type", "online"));
        params.push(("prompt", "select_account"));
    }

    let url = Url::parse_with_params(provider.authorize_endpoint(), &params)
        .map_err(|e| AppError::OAuth(format!("invalid authorize url: {e}")))?;
    Ok(url.to_string())
}
