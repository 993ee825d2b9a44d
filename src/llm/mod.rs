// LLM abstraction layer

pub mod client;
pub mod openai;
pub mod provider;

pub use client::{CompletionSettings, ModelClient, ModelClientError};
pub use provider::{LLMAdapter, LLMError};
