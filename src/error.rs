use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::database::StoreError;
use crate::utils::{error_codes, error_to_api_response};

pub const TOO_MANY_ATTEMPTS: &str = "Too many attempts. Please try again later.";
const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{}", TOO_MANY_ATTEMPTS)]
    RateLimited,

    #[error("You must be signed in to do that")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Please confirm your email address before signing in")]
    EmailNotConfirmed,

    #[error("Current password is incorrect")]
    IncorrectPassword,

    #[error("Password is incorrect")]
    IncorrectDeletionPassword,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("An account with this email already exists")]
    EmailTaken,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("SITE_URL is not configured")]
    MissingSiteUrl,

    #[error("{0} sign-in is not configured")]
    ProviderNotConfigured(&'static str),

    #[error("OAuth exchange failed: {0}")]
    OAuth(String),

    #[error(transparent)]
    Store(StoreError),

    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// 内部错误不把细节暴露给用户
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AppError::Store(_)
                | AppError::Token(_)
                | AppError::Hash(_)
                | AppError::Template(_)
                | AppError::Json(_)
                | AppError::OAuth(_)
                | AppError::MissingSiteUrl
        )
    }

    pub fn user_message(&self) -> String {
        if self.is_internal() {
            GENERIC_FAILURE.to_string()
        } else {
            self.to_string()
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            AppError::Validation(_) => error_codes::VALIDATION_ERROR,
            AppError::RateLimited => error_codes::RATE_LIMIT,
            AppError::Unauthorized => error_codes::PERMISSION_DENIED,
            AppError::InvalidCredentials
            | AppError::EmailNotConfirmed
            | AppError::IncorrectPassword
            | AppError::IncorrectDeletionPassword => error_codes::AUTH_FAILED,
            AppError::UsernameTaken | AppError::EmailTaken => error_codes::USER_EXISTS,
            AppError::NotFound(_) => error_codes::NOT_FOUND,
            _ => error_codes::INTERNAL_ERROR,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidCredentials
            | AppError::EmailNotConfirmed
            | AppError::IncorrectPassword
            | AppError::IncorrectDeletionPassword => StatusCode::UNAUTHORIZED,
            AppError::UsernameTaken | AppError::EmailTaken => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ProviderNotConfigured(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmailTaken => AppError::EmailTaken,
            StoreError::UsernameTaken => AppError::UsernameTaken,
            StoreError::NotFound(what) => AppError::NotFound(what),
            other => AppError::Store(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            tracing::error!("Request failed: {}", self);
        }
        let status = self.status();
        (status, error_to_api_response::<()>(self.code(), self.user_message())).into_response()
    }
}
