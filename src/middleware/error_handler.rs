use axum::{
    body::{Body, to_bytes},
    http::{Request, header::CONTENT_LENGTH},
    middleware::Next,
    response::Response,
};
use tracing::error;

/// 日志中最多记录的响应体字节数，响应本身原样返回
const MAX_LOGGED_BODY: usize = 4096;

pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    let status = response.status();

    if status.is_client_error() {
        tracing::debug!(%method, %path, %status, "Request rejected");
        return response;
    }
    if !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    match to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            let logged = &bytes[..bytes.len().min(MAX_LOGGED_BODY)];
            error!(
                %method,
                %path,
                %status,
                body = %String::from_utf8_lossy(logged),
                truncated = bytes.len() > MAX_LOGGED_BODY,
                "Server error occurred"
            );
            // 重置body以便重新构建响应
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            error!(%method, %path, %status, "Failed to read error response body: {}", e);
            parts.headers.remove(CONTENT_LENGTH);
            Response::from_parts(parts, Body::empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, routing::get};
    use axum_test::TestServer;

    #[tokio::test]
    async fn server_errors_keep_their_body() {
        let app = Router::new()
            .route(
                "/boom",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable") }),
            )
            .layer(axum::middleware::from_fn(log_errors));
        let server = TestServer::new(app).unwrap();

        let response = server.get("/boom").await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_text("database unavailable");
    }

    #[tokio::test]
    async fn large_server_error_body_is_passed_through_whole() {
        let body = "x".repeat(MAX_LOGGED_BODY * 3);
        let expected = body.clone();
        let app = Router::new()
            .route(
                "/boom",
                get(move || async move { (StatusCode::BAD_GATEWAY, body) }),
            )
            .layer(axum::middleware::from_fn(log_errors));
        let server = TestServer::new(app).unwrap();

        let response = server.get("/boom").await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        assert_eq!(response.text().len(), expected.len());
        response.assert_text(expected);
    }
}
