use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    cache::SessionCacheOperations,
    database::{NotificationPreferences, ProfileUpdate},
    error::AppError,
    middleware::{ClientIp, CurrentSession, SensitiveAction, clear_session_cookie},
    result::ActionResult,
    routes::ActionForm,
    utils::{hash_password, verify_password},
    validation::{
        ChangePasswordSchema, ChangeUsernameSchema, DeleteAccountSchema,
        NotificationPreferencesForm, Schema, UpdateProfileSchema, is_checked,
    },
};

async fn apply_password_change(
    state: &AppState,
    session: CurrentSession,
    ip: &str,
    form: ChangePasswordSchema,
) -> Result<ActionResult, AppError> {
    let session = session.require()?;
    state.rate_limiter.enforce(ip, SensitiveAction::ChangePassword).await?;
    form.check()?;

    let user = state
        .auth
        .find_by_id(session.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let current = user
        .password_hash
        .as_deref()
        .ok_or(AppError::IncorrectPassword)?;
    if !verify_password(&form.current_password, current)? {
        return Err(AppError::IncorrectPassword);
    }

    let hash = hash_password(&form.new_password)?;
    state.auth.update_password(user.id, &hash).await?;

    tracing::info!("User {} changed password", user.id);
    Ok(ActionResult::success().with_message("Password updated successfully"))
}

#[axum::debug_handler]
pub async fn change_password(
    State(state): State<AppState>,
    session: CurrentSession,
    ClientIp(ip): ClientIp,
    ActionForm(form): ActionForm<ChangePasswordSchema>,
) -> ActionResult {
    apply_password_change(&state, session, &ip, form)
        .await
        .unwrap_or_else(ActionResult::from)
}

async fn apply_username_change(
    state: &AppState,
    session: CurrentSession,
    ip: &str,
    form: ChangeUsernameSchema,
) -> Result<ActionResult, AppError> {
    let session = session.require()?;
    state.rate_limiter.enforce(ip, SensitiveAction::ChangeUsername).await?;

    let form = form.normalize();
    form.check()?;

    if state
        .profiles
        .username_taken(&form.username, Some(session.user_id))
        .await?
    {
        return Err(AppError::UsernameTaken);
    }

    let profile = state
        .profiles
        .update_username(session.user_id, &form.username)
        .await?;

    tracing::info!("User {} is now @{}", profile.id, profile.username);
    Ok(ActionResult::success().with_message("Username updated successfully"))
}

#[axum::debug_handler]
pub async fn change_username(
    State(state): State<AppState>,
    session: CurrentSession,
    ClientIp(ip): ClientIp,
    ActionForm(form): ActionForm<ChangeUsernameSchema>,
) -> ActionResult {
    apply_username_change(&state, session, &ip, form)
        .await
        .unwrap_or_else(ActionResult::from)
}

async fn apply_profile_update(
    state: &AppState,
    session: CurrentSession,
    form: UpdateProfileSchema,
) -> Result<ActionResult, AppError> {
    let session = session.require()?;
    form.check()?;

    let update = ProfileUpdate {
        display_name: form.display_name,
        bio: form.bio,
        avatar_url: form.avatar_url,
    };
    state.profiles.update_profile(session.user_id, &update).await?;

    Ok(ActionResult::success().with_message("Profile updated successfully"))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    session: CurrentSession,
    ActionForm(form): ActionForm<UpdateProfileSchema>,
) -> ActionResult {
    apply_profile_update(&state, session, form)
        .await
        .unwrap_or_else(ActionResult::from)
}

async fn remove_account(
    state: &AppState,
    session: CurrentSession,
    ip: &str,
    form: DeleteAccountSchema,
) -> Result<(), AppError> {
    let session = session.require()?;
    state.rate_limiter.enforce(ip, SensitiveAction::DeleteAccount).await?;
    form.check()?;

    let user = state
        .auth
        .find_by_id(session.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if let Some(hash) = user.password_hash.as_deref() {
        let password = form
            .password
            .as_deref()
            .ok_or_else(|| AppError::Validation("Password is required".into()))?;
        if !verify_password(password, hash)? {
            return Err(AppError::IncorrectDeletionPassword);
        }
    }

    state.auth.delete_user(user.id).await?;
    if let Err(e) = SessionCacheOperations::revoke(state.cache.as_ref(), &session.claims).await {
        tracing::error!("Failed to revoke session of deleted user {}: {}", user.id, e);
    }

    tracing::info!("Deleted account {}", user.id);
    Ok(())
}

/// 删除失败时返回错误信息，成功后才跳转首页
#[axum::debug_handler]
pub async fn delete_account(
    State(state): State<AppState>,
    session: CurrentSession,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    ActionForm(form): ActionForm<DeleteAccountSchema>,
) -> (CookieJar, ActionResult) {
    match remove_account(&state, session, &ip, form).await {
        Ok(()) => (
            clear_session_cookie(jar),
            ActionResult::success()
                .with_message("Your account has been deleted")
                .redirect("/"),
        ),
        Err(e) => (jar, e.into()),
    }
}

async fn apply_notification_preferences(
    state: &AppState,
    session: CurrentSession,
    form: NotificationPreferencesForm,
) -> Result<ActionResult, AppError> {
    let session = session.require()?;

    let preferences = NotificationPreferences {
        security_alerts: is_checked(&form.security_alerts),
        email_updates: is_checked(&form.email_updates),
    };
    state
        .profiles
        .update_notification_preferences(session.user_id, preferences)
        .await?;

    Ok(ActionResult::success().with_message("Notification preferences updated"))
}

#[axum::debug_handler]
pub async fn update_notification_preferences(
    State(state): State<AppState>,
    session: CurrentSession,
    ActionForm(form): ActionForm<NotificationPreferencesForm>,
) -> ActionResult {
    apply_notification_preferences(&state, session, form)
        .await
        .unwrap_or_else(ActionResult::from)
}
