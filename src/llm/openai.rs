// OpenAI-compatible chat-completions adapter.
// Works against any provider exposing POST {base}/chat/completions with
// bearer authentication (OpenAI, OpenRouter, Groq, local gateways).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::llm::provider::{LLMAdapter, LLMError};
use crate::types::{LLMMessage, LLMRequest, LLMResponse, TokenUsage};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAIAdapter {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [LLMMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAIAdapter {
    pub fn new(api_key: &str, api_base: &str, timeout: Duration) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LLMError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

#[async_trait]
impl LLMAdapter for OpenAIAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> Result<LLMResponse, LLMError> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(LLMError::RateLimited(message));
            }
            return Err(LLMError::Status { status, message });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LLMError::InvalidResponse(format!("undecodable body: {}", e)))?;

        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::InvalidResponse("no choices returned".to_string()))?;

        let usage = chat
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_default(),
            usage,
        })
    }
}
