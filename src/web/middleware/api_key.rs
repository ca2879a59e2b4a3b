use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::api_error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects requests whose `x-api-key` header does not match the configured
/// key. With no key configured every request passes.
pub async fn require_api_key(
    State(expected): State<Option<String>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = expected else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key == expected => next.run(request).await,
        Some(_) => ApiError::Unauthorized("Invalid API key".to_string()).into_response(),
        None => ApiError::Unauthorized(format!("Missing {API_KEY_HEADER} header")).into_response(),
    }
}
