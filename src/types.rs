// Type definitions and error taxonomy

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Failures raised while locating or reading a stored dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset '{0}' not found")]
    NotFound(String),

    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("Dataset '{0}' is corrupt: {1}")]
    Corrupt(String, String),

    #[error("Failed to read dataset: {0}")]
    Read(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream malformed: {0}")]
    UpstreamMalformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UpstreamUnavailable(_) | AppError::UpstreamMalformed(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Io(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable detail for the response body. Internal failures never
    /// leak their cause (it may contain file-system paths).
    pub fn detail(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::InvalidRequest(msg)
            | AppError::UnsupportedMediaType(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::UpstreamUnavailable(msg)
            | AppError::UpstreamMalformed(msg) => msg.clone(),
            AppError::Io(_) | AppError::Internal(_) => {
                "An unexpected error occurred while processing the request.".to_string()
            }
        }
    }
}

impl From<DatasetError> for AppError {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::NotFound(id) => AppError::NotFound(format!("Dataset '{}' not found.", id)),
            DatasetError::Unsupported(ext) => AppError::UnsupportedMediaType(format!(
                "File type '{}' is not supported. Please use a CSV or XLSX file.",
                ext
            )),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = %status, error = %self, "Request failed");
        }
        let body = serde_json::json!({ "detail": self.detail() });
        (status, Json(body)).into_response()
    }
}
