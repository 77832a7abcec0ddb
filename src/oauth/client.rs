use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{OAuthProfile, OAuthProvider};
use crate::config::OAuthCredentials;
use crate::error::AppError;

const USER_AGENT: &str = "backend-oauth";

/// 用授权码换取第三方用户信息
#[async_trait]
pub trait OAuthExchange: Send + Sync {
    async fn exchange(
        &self,
        provider: OAuthProvider,
        credentials: &OAuthCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthProfile, AppError>;
}

#[derive(Clone, Default)]
pub struct HttpOAuthClient {
    http: reqwest::Client,
}

impl HttpOAuthClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    avatar_url: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[derive(Deserialize)]
struct GoogleUser {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

fn http_error(e: reqwest::Error) -> AppError {
    AppError::OAuth(e.to_string())
}

impl HttpOAuthClient {
    async fn access_token(
        &self,
        provider: OAuthProvider,
        credentials: &OAuthCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, AppError> {
        let (endpoint, params) = match provider {
            OAuthProvider::Github => (
                "https://github.com/login/oauth/access_token",
                vec![
                    ("client_id", credentials.client_id.as_str()),
                    ("client_secret", credentials.client_secret.as_str()),
                    ("code", code),
                    ("redirect_uri", redirect_uri),
                ],
            ),
            OAuthProvider::Google => (
                "https://oauth2.googleapis.com/token",
                vec![
                    ("client_id", credentials.client_id.as_str()),
                    ("client_secret", credentials.client_secret.as_str()),
                    ("code", code),
                    ("redirect_uri", redirect_uri),
                    ("grant_type", "authorization_code"),
                ],
            ),
        };

        let response: TokenResponse = self
            .http
            .post(endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;

        match response.access_token {
            Some(token) => Ok(token),
            None => Err(AppError::OAuth(format!(
                "{} token exchange failed: {} {}",
                provider.as_str(),
                response.error.unwrap_or_default(),
                response.error_description.unwrap_or_default()
            ))),
        }
    }

    async fn github_profile(&self, token: &str) -> Result<OAuthProfile, AppError> {
        let user: GithubUser = self
            .http
            .get("https://api.github.com/user")
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(http_error)?
            .error_for_status()
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;

        // 公开邮箱为空时读取已验证的主邮箱
        let email = match user.email {
            Some(email) => email,
            None => {
                let emails: Vec<GithubEmail> = self
                    .http
                    .get("https://api.github.com/user/emails")
                    .bearer_auth(token)
                    .header(reqwest::header::USER_AGENT, USER_AGENT)
                    .send()
                    .await
                    .map_err(http_error)?
                    .error_for_status()
                    .map_err(http_error)?
                    .json()
                    .await
                    .map_err(http_error)?;
                emails
                    .into_iter()
                    .find(|e| e.primary && e.verified)
                    .map(|e| e.email)
                    .ok_or_else(|| AppError::OAuth("GitHub account has no verified email".into()))?
            }
        };

        Ok(OAuthProfile {
            provider: OAuthProvider::Github,
            provider_user_id: user.id.to_string(),
            metadata: json!({
                "user_name": user.login,
                "full_name": user.name,
                "avatar_url": user.avatar_url,
                "email": email,
            }),
            email,
        })
    }

    async fn google_profile(&self, token: &str) -> Result<OAuthProfile, AppError> {
        let user: GoogleUser = self
            .http
            .get("https://openidconnect.googleapis.com/v1/userinfo")
            .bearer_auth(token)
            .send()
            .await
            .map_err(http_error)?
            .error_for_status()
            .map_err(http_error)?
            .json()
            .await
            .map_err(http_error)?;

        let email = match (user.email, user.email_verified) {
            (Some(email), Some(true)) => email,
            _ => return Err(AppError::OAuth("Google account has no verified email".into())),
        };

        Ok(OAuthProfile {
            provider: OAuthProvider::Google,
            provider_user_id: user.sub,
            metadata: json!({
                "name": user.name,
                "picture": user.picture,
                "email": email,
            }),
            email,
        })
    }
}

#[async_trait]
impl OAuthExchange for HttpOAuthClient {
    async fn exchange(
        &self,
        provider: OAuthProvider,
        credentials: &OAuthCredentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthProfile, AppError> {
        let token = self
            .access_token(provider, credentials, code, redirect_uri)
            .await?;

        match provider {
            OAuthProvider::Github => self.github_profile(&token).await,
            OAuthProvider::Google => self.google_profile(&token).await,
        }
    }
}
