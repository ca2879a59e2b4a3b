use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::core::registrations::ValidationIssue;
use crate::core::sheets::{SheetsApiError, SheetsError};

/// Every error a handler can return. Rendered as
/// `{success: false, error, message, details?}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<ValidationIssue>,
    },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(details: Vec<ValidationIssue>) -> Self {
        ApiError::Validation {
            message: "Invalid request data".to_string(),
            details,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error kind for the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "ValidationError",
            ApiError::Unauthorized(_) => "AuthError",
            ApiError::Forbidden(_) => "PermissionError",
            ApiError::NotFound(_) => "NotFoundError",
            ApiError::RateLimited(_) => "RateLimitError",
            ApiError::Unavailable(_) => "NetworkError",
            ApiError::Internal(_) => "UnknownError",
        }
    }
}

impl From<SheetsError> for ApiError {
    fn from(error: SheetsError) -> Self {
        match error {
            SheetsError::Validation(issues) => ApiError::validation(issues),
            SheetsError::Api(api) => match api {
                SheetsApiError::Auth(msg) => {
                    ApiError::Unauthorized(format!("Google authentication failed: {msg}"))
                }
                SheetsApiError::PermissionDenied(msg) => {
                    ApiError::Forbidden(format!("Google denied access: {msg}"))
                }
                SheetsApiError::NotFound(msg) => {
                    ApiError::NotFound(format!("Spreadsheet not found: {msg}"))
                }
                SheetsApiError::RateLimited(msg) => ApiError::RateLimited(format!(
                    "Google API rate limit exceeded, retry later: {msg}"
                )),
                SheetsApiError::Network(msg) => {
                    ApiError::Unavailable(format!("Google APIs are unreachable: {msg}"))
                }
                other @ (SheetsApiError::Upstream { .. } | SheetsApiError::Decode(_)) => {
                    ApiError::Internal(other.to_string())
                }
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation {
            message: rejection.body_text(),
            details: Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let mut body = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let ApiError::Validation { details, .. } = &self {
            if !details.is_empty() {
                body["details"] = json!(details);
            }
        }

        (status, Json(body)).into_response()
    }
}
