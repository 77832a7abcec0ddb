use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 所有 server action 的统一返回结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

impl ActionResult {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn redirect(mut self, to: impl Into<String>) -> Self {
        self.redirect_to = Some(to.into());
        self
    }
}

impl From<AppError> for ActionResult {
    fn from(err: AppError) -> Self {
        if err.is_internal() {
            tracing::error!("Action failed: {}", err);
        }
        let result = ActionResult::error(err.user_message());
        match err {
            AppError::Unauthorized => result.redirect("/login"),
            AppError::MissingSiteUrl => result.redirect("/error"),
            _ => result,
        }
    }
}

impl IntoResponse for ActionResult {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_and_skips_empty_fields() {
        let json = serde_json::to_value(ActionResult::success().redirect("/")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "redirectTo": "/" }));
    }

    #[test]
    fn unauthorized_error_points_to_login() {
        let result = ActionResult::from(AppError::Unauthorized);
        assert!(!result.success);
        assert_eq!(result.redirect_to.as_deref(), Some("/login"));
    }

    #[test]
    fn internal_errors_are_replaced_by_generic_message() {
        let result = ActionResult::from(AppError::OAuth("token endpoint said no".into()));
        assert_eq!(
            result.error.as_deref(),
            Some("Something went wrong. Please try again.")
        );
    }
}
