//! 表单校验
//!
//! 每个 server action 的表单都是一个 `validator` 派生的 schema。
//! 校验失败时只返回按字段顺序的第一条错误提示，跨字段规则在所有字段通过后才检查。

pub mod password;
pub mod schemas;

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;

pub use password::{PasswordStrength, validate_password_strength};
pub use schemas::*;

/// 以字母开头，3 到 20 位字母、数字或下划线
pub static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]{2,19}$").expect("valid username regex"));

/// 字母开头，只允许字母、空格、撇号、连字符和点号
pub static FULL_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{L}[\p{L}\s'.-]*$").expect("valid full name regex"));

/// 跨字段错误在 validator 中的键
const SCHEMA_LEVEL: &str = "__all__";

pub trait Schema: Validate {
    /// 字段的声明顺序，决定哪条错误先展示
    const FIELDS: &'static [&'static str];

    fn check(&self) -> Result<(), AppError> {
        self.validate()
            .map_err(|errors| AppError::Validation(first_issue(&errors, Self::FIELDS)))
    }
}

pub fn first_issue(errors: &ValidationErrors, order: &[&str]) -> String {
    let fields = errors.field_errors();

    order
        .iter()
        .chain(std::iter::once(&SCHEMA_LEVEL))
        .find_map(|name| fields.get(*name).and_then(|errs| errs.first()))
        .or_else(|| fields.values().flat_map(|errs| errs.iter()).next())
        .map(describe)
        .unwrap_or_else(|| "Invalid input".to_string())
}

fn describe(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => format!("Invalid value ({})", error.code),
    }
}

pub(crate) fn issue(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

/// 表单里的空输入框按未填写处理
pub fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// 复选框未勾选时浏览器不提交该字段
pub fn is_checked(value: &Option<String>) -> bool {
    match value.as_deref() {
        Some(v) => !matches!(v.trim(), "" | "false" | "off" | "0"),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_regex_requires_leading_letter_and_length() {
        assert!(USERNAME_REGEX.is_match("abc123"));
        assert!(USERNAME_REGEX.is_match("a_b"));
        assert!(!USERNAME_REGEX.is_match("1abc"));
        assert!(!USERNAME_REGEX.is_match("ab"));
        assert!(!USERNAME_REGEX.is_match("abcdefghijklmnopqrstu"));
        assert!(!USERNAME_REGEX.is_match("bad-name"));
    }

    #[test]
    fn full_name_regex_rejects_digits() {
        assert!(FULL_NAME_REGEX.is_match("Jane Doe"));
        assert!(FULL_NAME_REGEX.is_match("Zoë O'Brien-Smith"));
        assert!(!FULL_NAME_REGEX.is_match("Jane Doe 2"));
        assert!(!FULL_NAME_REGEX.is_match("R2D2"));
    }

    #[test]
    fn checkbox_values() {
        assert!(is_checked(&Some("on".into())));
        assert!(is_checked(&Some("true".into())));
        assert!(!is_checked(&Some("off".into())));
        assert!(!is_checked(&None));
    }
}
