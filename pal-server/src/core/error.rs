//! 统一错误处理
//!
//! [`AppError`] 把打印管线的错误分类映射到 HTTP 响应：
//!
//! | 分类 | 状态码 | 响应体 |
//! |------|--------|--------|
//! | NotFound | 404 | JSON |
//! | Validation / Config | 400 | JSON |
//! | UnsupportedMedia | 415 | JSON |
//! | Unauthorized | 401 | JSON |
//! | AuthUnavailable | 503 | JSON |
//! | PreviewFailed | 400 | text/plain (原样错误消息) |
//! | OperationFailed | 500 | `{"ok": false, "error": ...}` |
//! | Internal | 500 | 不泄露细节 |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedMedia(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Auth token required but not configured")]
    AuthUnavailable,

    /// Preview rendering failed; surfaced as plain text, never a stack trace
    #[error("{0}")]
    PreviewFailed(String),

    /// Print/AirPrint/config-apply failure surfaced as `{ok:false, error}`
    #[error("{0}")]
    OperationFailed(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({"ok": false, "error": msg}))).into_response()
            }
            AppError::Validation(msg) | AppError::Config(msg) => (
                StatusCode::BAD_REQUEST,
                Json(json!({"ok": false, "error": msg})),
            )
                .into_response(),
            AppError::UnsupportedMedia(msg) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                Json(json!({"ok": false, "error": msg})),
            )
                .into_response(),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"ok": false, "error": "Unauthorized"})),
            )
                .into_response(),
            AppError::AuthUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"ok": false, "error": "Auth token required but not configured"})),
            )
                .into_response(),
            AppError::PreviewFailed(msg) => {
                (StatusCode::BAD_REQUEST, msg).into_response()
            }
            AppError::OperationFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"ok": false, "error": msg})),
            )
                .into_response(),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"ok": false, "error": "An internal error occurred"})),
                )
                    .into_response()
            }
        }
    }
}

/// 处理器的 Result 类型别名
pub type Result<T> = std::result::Result<T, AppError>;
