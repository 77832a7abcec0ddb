use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub notification_preferences: Json<NotificationPreferences>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub security_alerts: bool,
    pub email_updates: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            security_alerts: true,
            email_updates: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// 新用户创建时生成的资料行
///
/// 不同登录方式写入的元数据字段不同：
/// 邮箱注册为 `user_name`/`full_name`，GitHub 为 `user_name`/`full_name`/`avatar_url`，
/// Google 为 `name`/`picture`。用户名缺省取邮箱 `@` 前的部分。
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl NewProfile {
    pub fn from_user_metadata(id: Uuid, email: &str, metadata: &Value) -> Self {
        let username = metadata_text(metadata, "user_name")
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Self {
            id,
            username: normalize_username(&username),
            display_name: metadata_text(metadata, "full_name")
                .or_else(|| metadata_text(metadata, "name")),
            avatar_url: metadata_text(metadata, "avatar_url")
                .or_else(|| metadata_text(metadata, "picture")),
        }
    }

    /// 用户名冲突时的第 n 个候选
    pub fn username_candidate(&self, attempt: u32) -> String {
        if attempt == 0 {
            return self.username.clone();
        }
        let suffix = attempt.to_string();
        let keep = USERNAME_MAX_LEN - suffix.len();
        let base: String = self.username.chars().take(keep).collect();
        format!("{base}{suffix}")
    }
}

fn metadata_text(metadata: &Value, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 第三方用户名可能包含 `-`、`.` 或大写字母，收敛到 `[a-z][a-z0-9_]{2,19}`
pub fn normalize_username(raw: &str) -> String {
    let mut username: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if !username.starts_with(|c: char| c.is_ascii_lowercase()) {
        username.insert(0, 'u');
    }
    if username.len() < USERNAME_MIN_LEN {
        username.push_str("_user");
    }
    username.truncate(USERNAME_MAX_LEN);
    username
}
