//! Model Client
//!
//! Sends one prompt to the configured chat-completion provider and returns
//! the raw text. A transient failure is retried once with the identical
//! request; anything else fails immediately.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::LLMConfig;
use crate::llm::openai::OpenAIAdapter;
use crate::llm::provider::{LLMAdapter, LLMError};
use crate::types::{AppError, LLMMessage, LLMRequest};
use crate::utils::retry::{with_retry, RetryPolicy};

pub const SYSTEM_PROMPT: &str = "You are a helpful data analyst designed to output JSON.";

#[derive(Debug, thiserror::Error)]
pub enum ModelClientError {
    #[error("model client is not configured")]
    NotConfigured,

    #[error("model call failed after retry: {0}")]
    TransientFailure(LLMError),

    #[error("model call failed: {0}")]
    Unexpected(LLMError),
}

impl From<ModelClientError> for AppError {
    fn from(err: ModelClientError) -> Self {
        match err {
            ModelClientError::NotConfigured => AppError::UpstreamUnavailable(
                "The AI service is not configured. Set OPENAI_API_KEY and restart the server.".to_string(),
            ),
            ModelClientError::TransientFailure(_) => AppError::UpstreamUnavailable(
                "The AI service is currently unavailable. Please try again later.".to_string(),
            ),
            ModelClientError::Unexpected(LLMError::InvalidResponse(_)) => AppError::UpstreamMalformed(
                "The AI service returned a response that could not be read.".to_string(),
            ),
            ModelClientError::Unexpected(_) => AppError::UpstreamUnavailable(
                "The AI service rejected the request.".to_string(),
            ),
        }
    }
}

/// Request settings applied to every completion.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&LLMConfig> for CompletionSettings {
    fn from(config: &LLMConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

pub struct ModelClient {
    adapter: Option<Arc<dyn LLMAdapter>>,
    settings: CompletionSettings,
}

impl ModelClient {
    pub fn new(adapter: Option<Arc<dyn LLMAdapter>>, settings: CompletionSettings) -> Self {
        Self { adapter, settings }
    }

    /// Build the client once at start-up. A missing key leaves the client
    /// unconfigured rather than failing start-up.
    pub fn from_config(config: &LLMConfig) -> Self {
        let settings = CompletionSettings::from(config);
        let Some(api_key) = config.api_key.as_deref() else {
            warn!("OPENAI_API_KEY is not set; suggestion requests will fail until it is configured");
            return Self::new(None, settings);
        };

        match OpenAIAdapter::new(api_key, &config.api_base, Duration::from_secs(config.timeout_secs)) {
            Ok(adapter) => {
                info!(model = %settings.model, api_base = %config.api_base, "Model client configured");
                Self::new(Some(Arc::new(adapter)), settings)
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize model client");
                Self::new(None, settings)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, ModelClientError> {
        let adapter = self.adapter.as_ref().ok_or(ModelClientError::NotConfigured)?;

        let request = LLMRequest {
            model: self.settings.model.clone(),
            messages: vec![LLMMessage::system(SYSTEM_PROMPT), LLMMessage::user(prompt)],
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(self.settings.temperature),
        };

        let result = with_retry(
            RetryPolicy::ONCE_IMMEDIATE,
            |attempt| {
                info!(attempt, model = %request.model, "Calling model");
                adapter.create_chat_completion(&request)
            },
            LLMError::is_transient,
        )
        .await;

        match result {
            Ok(response) => {
                info!(
                    response_len = response.content.len(),
                    total_tokens = response.usage.total_tokens,
                    "Model response received"
                );
                Ok(response.content)
            }
            Err(e) if e.is_transient() => {
                error!(error = %e, "Model call failed after retry");
                Err(ModelClientError::TransientFailure(e))
            }
            Err(e) => {
                error!(error = %e, "Model call failed");
                Err(ModelClientError::Unexpected(e))
            }
        }
    }
}
