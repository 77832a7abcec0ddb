use axum::{
    Form,
    extract::{FromRequest, Request, rejection::FormRejection},
};
use serde::de::DeserializeOwned;

use crate::result::ActionResult;

pub const INVALID_SUBMISSION: &str = "Invalid form submission";

/// server action 的表单参数
///
/// 请求体无法解析时同样回应 `ActionResult`，而不是框架默认的 415/422 文本。
#[derive(Debug, Clone)]
pub struct ActionForm<T>(pub T);

impl<S, T> FromRequest<S> for ActionForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ActionResult;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Form::<T>::from_request(req, state)
            .await
            .map(|Form(value)| ActionForm(value))
            .map_err(|rejection: FormRejection| {
                tracing::debug!("Rejected action form: {}", rejection);
                ActionResult::error(INVALID_SUBMISSION)
            })
    }
}
