use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use minijinja::context;

use crate::{
    AppState, error::AppError, middleware::CurrentSession, routes::page_error,
};

#[axum::debug_handler]
pub async fn index(session: CurrentSession) -> Redirect {
    if session.is_signed_in() {
        Redirect::to("/settings")
    } else {
        Redirect::to("/login")
    }
}

fn simple_page(state: &AppState, session: &CurrentSession, template: &str) -> Response {
    match state
        .views
        .page(template, context! { viewer => session.is_signed_in() })
    {
        Ok(page) => page.into_response(),
        Err(e) => page_error(e),
    }
}

#[axum::debug_handler]
pub async fn login_page(State(state): State<AppState>, session: CurrentSession) -> Response {
    if session.is_signed_in() {
        return Redirect::to("/settings").into_response();
    }
    simple_page(&state, &session, "login.html")
}

#[axum::debug_handler]
pub async fn confirm_email_notice(
    State(state): State<AppState>,
    session: CurrentSession,
) -> Response {
    simple_page(&state, &session, "confirm_email.html")
}

#[axum::debug_handler]
pub async fn error_page(State(state): State<AppState>, session: CurrentSession) -> Response {
    simple_page(&state, &session, "error.html")
}

#[axum::debug_handler]
pub async fn auth_code_error(State(state): State<AppState>, session: CurrentSession) -> Response {
    simple_page(&state, &session, "auth_code_error.html")
}

async fn render_settings(state: &AppState, session: CurrentSession) -> Result<Response, AppError> {
    let session = session.require()?;

    let user = state
        .auth
        .find_by_id(session.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let profile = state
        .profiles
        .find_by_id(user.id)
        .await?
        .ok_or(AppError::NotFound("profile"))?;
    let identities = state.auth.identities(user.id).await?;

    let page = state.views.page(
        "settings.html",
        context! {
            viewer => true,
            email => user.email,
            has_password => user.has_password(),
            profile => profile,
            identities => identities,
        },
    )?;
    Ok(page.into_response())
}

#[axum::debug_handler]
pub async fn settings_page(State(state): State<AppState>, session: CurrentSession) -> Response {
    render_settings(&state, session)
        .await
        .unwrap_or_else(page_error)
}
