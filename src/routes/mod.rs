pub mod auth;
pub mod comment;
pub mod extract;
pub mod pages;
pub mod settings;

pub use extract::ActionForm;

use axum::{
    Router,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};

use crate::{
    AppState,
    error::AppError,
    middleware::{auth_middleware, log_errors, rate_limit},
};

/// 页面渲染失败时跳转，未登录跳转登录页
pub(crate) fn page_error(err: AppError) -> Response {
    match err {
        AppError::Unauthorized => Redirect::to("/login").into_response(),
        err => {
            tracing::error!("Failed to render page: {}", err);
            Redirect::to("/error").into_response()
        }
    }
}

pub fn router(state: AppState) -> Router {
    // 表单提交的 server action，统一返回 ActionResult
    let actions = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/signout", post(auth::signout))
        .route("/sign-in-with-github", post(auth::sign_in_with_github))
        .route("/sign-in-with-google", post(auth::sign_in_with_google))
        .route("/change-password", post(settings::change_password))
        .route("/change-username", post(settings::change_username))
        .route("/update-profile", post(settings::update_profile))
        .route("/delete-account", post(settings::delete_account))
        .route(
            "/update-notification-preferences",
            post(settings::update_notification_preferences),
        )
        .route("/create-comment", post(comment::create_comment));

    let pages = Router::new()
        .route("/", get(pages::index))
        .route("/login", get(pages::login_page))
        .route("/settings", get(pages::settings_page))
        .route("/error", get(pages::error_page))
        .route("/auth/confirm-email", get(pages::confirm_email_notice))
        .route("/auth/auth-code-error", get(pages::auth_code_error))
        .route("/auth/callback", get(auth::oauth_callback))
        .route("/auth/confirm", get(auth::confirm_email))
        .route("/posts/{post_id}", get(comment::post_page));

    let api = Router::new().route("/posts/{post_id}/comments", get(comment::list_comments));

    Router::new()
        .merge(pages)
        .nest("/actions", actions)
        .nest("/api", api)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit,
        ))
        .with_state(state)
}
