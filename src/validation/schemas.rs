use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::password::{PASSWORD_MAX_LEN, validate_password_strength};
use super::{FULL_NAME_REGEX, Schema, USERNAME_REGEX, empty_string_as_none, issue};

pub const DELETE_CONFIRMATION: &str = "DELETE";

fn strong_password(password: &str) -> Result<(), ValidationError> {
    if password.len() > PASSWORD_MAX_LEN {
        return Err(issue("length", "Password must be 72 bytes or less"));
    }
    match validate_password_strength(password).requirements.first_unmet() {
        Some(message) => Err(issue("password_strength", message)),
        None => Ok(()),
    }
}

fn delete_confirmation(value: &str) -> Result<(), ValidationError> {
    if value.trim() == DELETE_CONFIRMATION {
        Ok(())
    } else {
        Err(issue("confirmation", "Please type DELETE to confirm"))
    }
}

fn uuid_value(value: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(value.trim())
        .map(|_| ())
        .map_err(|_| issue("uuid", "Invalid identifier"))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginSchema {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl LoginSchema {
    pub fn normalize(mut self) -> Self {
        self.email = normalize_email(&self.email);
        self
    }
}

impl Schema for LoginSchema {
    const FIELDS: &'static [&'static str] = &["email", "password"];
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SignupSchema {
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(custom(function = "strong_password"))]
    pub password: String,
    #[validate(
        length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"),
        regex(
            path = *USERNAME_REGEX,
            message = "Username must start with a letter and contain only letters, numbers, and underscores"
        )
    )]
    pub username: String,
    #[validate(
        length(min = 1, max = 50, message = "Full name must be between 1 and 50 characters"),
        regex(
            path = *FULL_NAME_REGEX,
            message = "Full name can only contain letters, spaces, apostrophes, hyphens, and periods"
        )
    )]
    pub full_name: String,
}

impl SignupSchema {
    pub fn normalize(mut self) -> Self {
        self.email = normalize_email(&self.email);
        self.username = self.username.trim().to_lowercase();
        self.full_name = self.full_name.trim().to_string();
        self
    }
}

impl Schema for SignupSchema {
    const FIELDS: &'static [&'static str] = &["email", "password", "username", "full_name"];
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "new_password_rules"))]
pub struct ChangePasswordSchema {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(custom(function = "strong_password"))]
    pub new_password: String,
    #[validate(length(min = 1, message = "Please confirm your new password"))]
    pub confirm_password: String,
}

fn new_password_rules(form: &ChangePasswordSchema) -> Result<(), ValidationError> {
    if form.new_password != form.confirm_password {
        return Err(issue("password_mismatch", "Passwords do not match"));
    }
    if form.new_password == form.current_password {
        return Err(issue(
            "password_unchanged",
            "New password must be different from current password",
        ));
    }
    Ok(())
}

impl Schema for ChangePasswordSchema {
    const FIELDS: &'static [&'static str] = &["current_password", "new_password", "confirm_password"];
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ChangeUsernameSchema {
    #[validate(
        length(min = 3, max = 20, message = "Username must be between 3 and 20 characters"),
        regex(
            path = *USERNAME_REGEX,
            message = "Username must start with a letter and contain only letters, numbers, and underscores"
        )
    )]
    pub username: String,
}

impl ChangeUsernameSchema {
    pub fn normalize(mut self) -> Self {
        self.username = self.username.trim().to_lowercase();
        self
    }
}

impl Schema for ChangeUsernameSchema {
    const FIELDS: &'static [&'static str] = &["username"];
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateProfileSchema {
    #[serde(deserialize_with = "empty_string_as_none")]
    #[validate(length(max = 50, message = "Display name must be 50 characters or less"))]
    pub display_name: Option<String>,
    #[serde(deserialize_with = "empty_string_as_none")]
    #[validate(length(max = 500, message = "Bio must be 500 characters or less"))]
    pub bio: Option<String>,
    #[serde(deserialize_with = "empty_string_as_none")]
    #[validate(url(message = "Please enter a valid URL"))]
    pub avatar_url: Option<String>,
}

impl Schema for UpdateProfileSchema {
    const FIELDS: &'static [&'static str] = &["display_name", "bio", "avatar_url"];
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct DeleteAccountSchema {
    #[validate(custom(function = "delete_confirmation"))]
    pub confirmation: String,
    /// 有密码的账号必须再次输入密码
    #[serde(deserialize_with = "empty_string_as_none")]
    pub password: Option<String>,
}

impl Schema for DeleteAccountSchema {
    const FIELDS: &'static [&'static str] = &["confirmation", "password"];
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotificationPreferencesForm {
    pub security_alerts: Option<String>,
    pub email_updates: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateCommentSchema {
    #[validate(custom(function = "uuid_value"))]
    pub post_id: String,
    #[serde(deserialize_with = "empty_string_as_none")]
    #[validate(custom(function = "uuid_value"))]
    pub parent_comment_id: Option<String>,
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,
}

impl CreateCommentSchema {
    pub fn normalize(mut self) -> Self {
        self.content = self.content.trim().to_string();
        self
    }

    pub fn post_id(&self) -> Option<Uuid> {
        Uuid::parse_str(self.post_id.trim()).ok()
    }

    pub fn parent_comment_id(&self) -> Option<Uuid> {
        self.parent_comment_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

impl Schema for CreateCommentSchema {
    const FIELDS: &'static [&'static str] = &["post_id", "parent_comment_id", "content"];
}
