use async_trait::async_trait;
use reqwest::StatusCode;

use crate::types::{LLMRequest, LLMResponse};

/// Failures from a chat-completion provider.
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl LLMError {
    /// Connection failures, timeouts, 429 and 5xx may succeed on a second try.
    pub fn is_transient(&self) -> bool {
        match self {
            LLMError::Transport(_) | LLMError::RateLimited(_) => true,
            LLMError::Status { status, .. } => status.is_server_error(),
            LLMError::InvalidResponse(_) => false,
        }
    }
}

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> Result<LLMResponse, LLMError>;
}
