use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::{
    AppState,
    cache::{SessionCacheOperations, TokenCacheOperations},
    database::{AuthUser, NewAuthUser},
    error::AppError,
    middleware::{
        ClientIp, CurrentSession, SensitiveAction, clear_session_cookie, session_cookie,
    },
    oauth::{self, OAuthProvider},
    result::ActionResult,
    routes::ActionForm,
    utils::{generate_token, hash_password, verify_password},
    validation::{LoginSchema, Schema, SignupSchema},
};

use super::model::{CallbackQuery, ConfirmQuery};

const AUTH_CODE_ERROR_PATH: &str = "/auth/auth-code-error";

/// 为用户签发会话令牌并写入 cookie
fn start_session(state: &AppState, jar: CookieJar, user: &AuthUser) -> Result<CookieJar, AppError> {
    let (token, _claims) = generate_token(user.id, &user.email, &state.config)?;
    Ok(jar.add(session_cookie(token, &state.config)))
}

async fn authenticate(state: &AppState, ip: &str, form: LoginSchema) -> Result<AuthUser, AppError> {
    state.rate_limiter.enforce(ip, SensitiveAction::Login).await?;

    let form = form.normalize();
    form.check()?;

    let user = state
        .auth
        .find_by_email(&form.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    // 仅通过第三方登录的账号没有密码
    let hash = user
        .password_hash
        .as_deref()
        .ok_or(AppError::InvalidCredentials)?;
    if !verify_password(&form.password, hash)? {
        return Err(AppError::InvalidCredentials);
    }

    if state.config.require_email_confirmation && !user.is_confirmed() {
        return Err(AppError::EmailNotConfirmed);
    }

    Ok(user)
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    ActionForm(form): ActionForm<LoginSchema>,
) -> (CookieJar, ActionResult) {
    let user = match authenticate(&state, &ip, form).await {
        Ok(user) => user,
        Err(e) => return (jar, e.into()),
    };

    match start_session(&state, jar.clone(), &user) {
        Ok(jar) => {
            tracing::info!("User {} signed in", user.id);
            (jar, ActionResult::success().redirect("/"))
        }
        Err(e) => (jar, e.into()),
    }
}

async fn register(state: &AppState, ip: &str, form: SignupSchema) -> Result<AuthUser, AppError> {
    state.rate_limiter.enforce(ip, SensitiveAction::Signup).await?;

    let form = form.normalize();
    form.check()?;

    if state.profiles.username_taken(&form.username, None).await? {
        return Err(AppError::UsernameTaken);
    }

    let password_hash = hash_password(&form.password)?;
    let user = state
        .auth
        .sign_up(NewAuthUser {
            email: form.email,
            password_hash: Some(password_hash),
            metadata: json!({
                "user_name": form.username,
                "full_name": form.full_name,
            }),
            email_confirmed: !state.config.require_email_confirmation,
        })
        .await?;

    tracing::info!("Registered user {}", user.id);
    Ok(user)
}

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    ActionForm(form): ActionForm<SignupSchema>,
) -> (CookieJar, ActionResult) {
    let user = match register(&state, &ip, form).await {
        Ok(user) => user,
        Err(e) => return (jar, e.into()),
    };

    if user.is_confirmed() {
        return match start_session(&state, jar.clone(), &user) {
            Ok(jar) => (jar, ActionResult::success().redirect("/")),
            Err(e) => (jar, e.into()),
        };
    }

    match TokenCacheOperations::issue_email_confirmation(state.cache.as_ref(), user.id, &user.email)
        .await
    {
        Ok(token) => {
            // 没有接入邮件服务，确认链接写入日志
            let base = state.config.site_url.as_deref().unwrap_or_default();
            tracing::info!(
                "Email confirmation link for {}: {}/auth/confirm?token={}",
                user.email,
                base,
                token
            );
            (
                jar,
                ActionResult::success()
                    .with_message("Check your email to confirm your account")
                    .redirect("/auth/confirm-email"),
            )
        }
        Err(e) => (jar, AppError::from(e).into()),
    }
}

#[axum::debug_handler]
pub async fn signout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    jar: CookieJar,
) -> (CookieJar, ActionResult) {
    if let Some(session) = session {
        if let Err(e) = SessionCacheOperations::revoke(state.cache.as_ref(), &session.claims).await {
            tracing::error!("Failed to revoke session for {}: {}", session.user_id, e);
        }
        tracing::info!("User {} signed out", session.user_id);
    }

    (clear_session_cookie(jar), ActionResult::success().redirect("/login"))
}

async fn oauth_redirect(state: &AppState, provider: OAuthProvider) -> Result<String, AppError> {
    let site_url = state.config.site_url.as_deref().ok_or(AppError::MissingSiteUrl)?;
    let credentials = provider.credentials(&state.config)?;

    let oauth_state =
        TokenCacheOperations::issue_oauth_state(state.cache.as_ref(), provider.as_str()).await?;

    oauth::authorize_url(
        provider,
        &credentials.client_id,
        &oauth::redirect_uri(site_url),
        &oauth_state,
    )
}

async fn sign_in_with(state: &AppState, provider: OAuthProvider) -> ActionResult {
    match oauth_redirect(state, provider).await {
        Ok(url) => ActionResult::success().redirect(url),
        Err(e) => {
            if matches!(e, AppError::MissingSiteUrl) {
                tracing::error!("SITE_URL is not set, cannot start {} sign-in", provider.as_str());
            }
            e.into()
        }
    }
}

#[axum::debug_handler]
pub async fn sign_in_with_github(State(state): State<AppState>) -> ActionResult {
    sign_in_with(&state, OAuthProvider::Github).await
}

#[axum::debug_handler]
pub async fn sign_in_with_google(State(state): State<AppState>) -> ActionResult {
    sign_in_with(&state, OAuthProvider::Google).await
}

async fn complete_oauth(state: &AppState, query: CallbackQuery) -> Result<AuthUser, AppError> {
    if let Some(error) = query.error {
        return Err(AppError::OAuth(format!(
            "provider returned {}: {}",
            error,
            query.error_description.unwrap_or_default()
        )));
    }

    let (code, oauth_state) = match (query.code, query.state) {
        (Some(code), Some(oauth_state)) => (code, oauth_state),
        _ => return Err(AppError::OAuth("callback is missing code or state".into())),
    };

    let cached = TokenCacheOperations::take_oauth_state(state.cache.as_ref(), &oauth_state)
        .await?
        .ok_or_else(|| AppError::OAuth("unknown or expired state".into()))?;
    let provider = OAuthProvider::parse(&cached.provider)
        .ok_or_else(|| AppError::OAuth(format!("unknown provider {}", cached.provider)))?;

    let site_url = state.config.site_url.as_deref().ok_or(AppError::MissingSiteUrl)?;
    let credentials = provider.credentials(&state.config)?;

    let profile = state
        .oauth
        .exchange(provider, credentials, &code, &oauth::redirect_uri(site_url))
        .await?;
    let user = state.auth.sign_in_with_identity(&profile).await?;

    tracing::info!("User {} signed in with {}", user.id, provider.as_str());
    Ok(user)
}

#[axum::debug_handler]
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let result = match complete_oauth(&state, query).await {
        Ok(user) => start_session(&state, jar.clone(), &user),
        Err(e) => Err(e),
    };

    match result {
        Ok(jar) => (jar, Redirect::to("/")).into_response(),
        Err(AppError::MissingSiteUrl) => Redirect::to("/error").into_response(),
        Err(e) => {
            tracing::warn!("OAuth callback failed: {}", e);
            Redirect::to(AUTH_CODE_ERROR_PATH).into_response()
        }
    }
}

async fn confirm(state: &AppState, query: ConfirmQuery) -> Result<AuthUser, AppError> {
    let token = query.token.ok_or(AppError::NotFound("confirmation token"))?;
    let pending = TokenCacheOperations::take_email_confirmation(state.cache.as_ref(), &token)
        .await?
        .ok_or(AppError::NotFound("confirmation token"))?;

    state.auth.confirm_email(pending.user_id).await?;
    let user = state
        .auth
        .find_by_id(pending.user_id)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    tracing::info!("Confirmed email for user {}", user.id);
    Ok(user)
}

#[axum::debug_handler]
pub async fn confirm_email(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ConfirmQuery>,
) -> Response {
    let result = match confirm(&state, query).await {
        Ok(user) => start_session(&state, jar.clone(), &user),
        Err(e) => Err(e),
    };

    match result {
        Ok(jar) => (jar, Redirect::to("/")).into_response(),
        Err(e) => {
            tracing::warn!("Email confirmation failed: {}", e);
            Redirect::to(AUTH_CODE_ERROR_PATH).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::TokenCacheOperations;
    use crate::database::{NewAuthUser, StoreError};
    use crate::error::AppError;
    use crate::result::ActionResult;
    use crate::test_support::{TestApp, form};
    use axum::http::StatusCode;
    use serde_json::json;

    fn signup_form(username: &str, email: &str) -> Vec<(&'static str, String)> {
        form(&[
            ("email", email),
            ("password", "Str0ng!pass"),
            ("username", username),
            ("full_name", "Jane Doe"),
        ])
    }

    #[tokio::test]
    async fn signup_with_taken_username_skips_sign_up_call() {
        let app = TestApp::new();
        app.seed_user("taken@example.com", "janedoe", Some("Str0ng!pass")).await;
        let calls_before = app.backend.sign_up_calls();

        let result: ActionResult = app
            .server
            .post("/actions/signup")
            .form(&signup_form("JaneDoe", "new@example.com"))
            .await
            .json();

        assert_eq!(result, ActionResult::error("Username is already taken"));
        assert_eq!(app.backend.sign_up_calls(), calls_before);
    }

    #[tokio::test]
    async fn signup_then_confirm_then_login() {
        let app = TestApp::new();

        let result: ActionResult = app
            .server
            .post("/actions/signup")
            .form(&signup_form("janedoe", "jane@example.com"))
            .await
            .json();
        assert!(result.success);
        assert_eq!(result.redirect_to.as_deref(), Some("/auth/confirm-email"));
        assert_eq!(app.backend.sign_up_calls(), 1);

        let login = form(&[("email", "jane@example.com"), ("password", "Str0ng!pass")]);
        let blocked: ActionResult = app.server.post("/actions/login").form(&login).await.json();
        assert_eq!(
            blocked.error.as_deref(),
            Some("Please confirm your email address before signing in")
        );

        let user = app.backend.user_by_email("jane@example.com").unwrap();
        let token = TokenCacheOperations::issue_email_confirmation(
            app.state.cache.as_ref(),
            user.id,
            &user.email,
        )
        .await
        .unwrap();

        let confirmed = app
            .server
            .get("/auth/confirm")
            .add_query_param("token", &token)
            .await;
        confirmed.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(confirmed.header("location"), "/");
        assert!(!confirmed.cookie("session").value().is_empty());
        assert!(app.backend.user_by_email("jane@example.com").unwrap().is_confirmed());

        // 确认令牌只能使用一次
        let replay = app
            .server
            .get("/auth/confirm")
            .add_query_param("token", &token)
            .await;
        assert_eq!(replay.header("location"), "/auth/auth-code-error");

        let response = app.server.post("/actions/login").form(&login).await;
        let signed_in: ActionResult = response.json();
        assert!(signed_in.success);
        assert_eq!(signed_in.redirect_to.as_deref(), Some("/"));
        assert!(!response.cookie("session").value().is_empty());
    }

    #[tokio::test]
    async fn confirm_with_unknown_or_missing_token_fails() {
        let app = TestApp::new();

        let unknown = app
            .server
            .get("/auth/confirm")
            .add_query_param("token", "not-a-real-token")
            .await;
        unknown.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(unknown.header("location"), "/auth/auth-code-error");

        let missing = app.server.get("/auth/confirm").await;
        assert_eq!(missing.header("location"), "/auth/auth-code-error");
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_generic() {
        let app = TestApp::new();
        app.seed_user("jane@example.com", "janedoe", Some("Str0ng!pass")).await;

        let result: ActionResult = app
            .server
            .post("/actions/login")
            .form(&form(&[("email", "jane@example.com"), ("password", "nope")]))
            .await
            .json();
        assert_eq!(result, ActionResult::error("Invalid email or password"));

        let unknown: ActionResult = app
            .server
            .post("/actions/login")
            .form(&form(&[("email", "ghost@example.com"), ("password", "nope")]))
            .await
            .json();
        assert_eq!(unknown, ActionResult::error("Invalid email or password"));
    }

    #[tokio::test]
    async fn login_is_rate_limited_per_ip() {
        let app = TestApp::new();
        let login = form(&[("email", "jane@example.com"), ("password", "nope")]);

        for _ in 0..5 {
            let result: ActionResult = app.server.post("/actions/login").form(&login).await.json();
            assert_eq!(result.error.as_deref(), Some("Invalid email or password"));
        }
        let result: ActionResult = app.server.post("/actions/login").form(&login).await.json();
        assert_eq!(
            result.error.as_deref(),
            Some("Too many attempts. Please try again later.")
        );
    }

    #[tokio::test]
    async fn forged_forwarding_headers_do_not_reset_the_limit() {
        let app = TestApp::new();
        let login = form(&[("email", "jane@example.com"), ("password", "nope")]);

        let mut errors = Vec::new();
        for i in 0..20 {
            let result: ActionResult = app
                .server
                .post("/actions/login")
                .add_header("x-real-ip", format!("10.0.0.{i}"))
                .add_header("x-forwarded-for", format!("10.1.0.{i}"))
                .form(&login)
                .await
                .json();
            errors.push(result.error.unwrap_or_default());
        }

        assert!(errors[..5].iter().all(|e| e == "Invalid email or password"));
        assert!(
            errors[5..]
                .iter()
                .all(|e| e == "Too many attempts. Please try again later.")
        );
    }

    #[tokio::test]
    async fn trusted_proxy_headers_key_the_limit() {
        let app = TestApp::with_config(|config| config.trust_proxy_headers = true);
        let login = form(&[("email", "jane@example.com"), ("password", "nope")]);

        for _ in 0..5 {
            app.server
                .post("/actions/login")
                .add_header("x-real-ip", "10.0.0.1")
                .form(&login)
                .await;
        }
        let blocked: ActionResult = app
            .server
            .post("/actions/login")
            .add_header("x-real-ip", "10.0.0.1")
            .form(&login)
            .await
            .json();
        assert_eq!(
            blocked.error.as_deref(),
            Some("Too many attempts. Please try again later.")
        );

        let other: ActionResult = app
            .server
            .post("/actions/login")
            .add_header("x-real-ip", "10.0.0.2")
            .form(&login)
            .await
            .json();
        assert_eq!(other.error.as_deref(), Some("Invalid email or password"));
    }

    #[tokio::test]
    async fn signout_revokes_the_token() {
        let app = TestApp::new();
        let user = app.seed_user("jane@example.com", "janedoe", Some("Str0ng!pass")).await;
        let token = app.token_for(&user);

        app.server
            .get("/settings")
            .authorization_bearer(&token)
            .await
            .assert_status(StatusCode::OK);

        let result: ActionResult = app
            .server
            .post("/actions/signout")
            .authorization_bearer(&token)
            .await
            .json();
        assert_eq!(result.redirect_to.as_deref(), Some("/login"));

        let response = app.server.get("/settings").authorization_bearer(&token).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/login");
    }

    #[tokio::test]
    async fn oauth_without_site_url_redirects_to_error() {
        let app = TestApp::with_config(|config| config.site_url = None);

        let result: ActionResult = app.server.post("/actions/sign-in-with-github").await.json();

        assert!(!result.success);
        assert_eq!(result.redirect_to.as_deref(), Some("/error"));
    }

    /// 发起 GitHub 登录，返回授权地址里的 state
    async fn start_github_sign_in(app: &TestApp) -> String {
        let result: ActionResult = app.server.post("/actions/sign-in-with-github").await.json();
        let authorize = result.redirect_to.expect("authorize url");
        assert!(authorize.starts_with("https://github.com/login/oauth/authorize?"));
        reqwest::Url::parse(&authorize)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn username_lost_to_concurrent_signup_is_reported_as_taken() {
        let app = TestApp::new();
        app.seed_user("first@example.com", "janedoe", Some("Str0ng!pass")).await;

        // 两次注册同时通过了 username_taken 检查，后写入的一方
        let err = app
            .state
            .auth
            .sign_up(NewAuthUser {
                email: "second@example.com".into(),
                password_hash: None,
                metadata: json!({ "user_name": "janedoe" }),
                email_confirmed: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::UsernameTaken));
        assert_eq!(
            ActionResult::from(AppError::from(err)),
            ActionResult::error("Username is already taken")
        );
        assert!(app.backend.user_by_email("second@example.com").is_none());
    }

    #[tokio::test]
    async fn oauth_username_collision_gets_numeric_suffix() {
        let app = TestApp::new();
        app.seed_user("someone@example.com", "octo_cat", None).await;

        let state = start_github_sign_in(&app).await;
        app.server
            .get("/auth/callback")
            .add_query_param("code", "good-code")
            .add_query_param("state", &state)
            .await
            .assert_status(StatusCode::SEE_OTHER);

        let user = app.backend.user_by_email("octo@example.com").unwrap();
        assert_eq!(app.backend.profile(user.id).unwrap().username, "octo_cat1");
    }

    #[tokio::test]
    async fn oauth_round_trip_creates_user_and_session() {
        let app = TestApp::new();

        let state = start_github_sign_in(&app).await;

        let response = app
            .server
            .get("/auth/callback")
            .add_query_param("code", "good-code")
            .add_query_param("state", &state)
            .await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header("location"), "/");
        assert!(!response.cookie("session").value().is_empty());

        let user = app.backend.user_by_email("octo@example.com").unwrap();
        assert!(user.is_confirmed());
        assert_eq!(app.backend.profile(user.id).unwrap().username, "octo_cat");

        // state 只能使用一次
        let replay = app
            .server
            .get("/auth/callback")
            .add_query_param("code", "good-code")
            .add_query_param("state", &state)
            .await;
        assert_eq!(replay.header("location"), "/auth/auth-code-error");
    }
}
