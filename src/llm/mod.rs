//! Completion service client.
//!
//! This module wraps the hosted LLM behind a single non-streaming call:
//! a prompt (an ordered list of role-tagged [`Message`]s) goes in, generated
//! text comes out.
//!
//! # Overview
//!
//! The [`CompletionClient`] trait is the seam the advisor depends on. The
//! production implementation is [`ChatCompletionsClient`], which talks to any
//! `OpenAI`-compatible Chat Completions endpoint (`OpenRouter` by default).
//!
//! # Example
//!
//! ```rust,ignore
//! use open_source_advisor::llm::{ChatCompletionsClient, LlmSettings, Message};
//!
//! let client = ChatCompletionsClient::new(settings)?;
//! let reply = client.complete(&[Message::user("Hello")]).await?;
//! ```

pub mod chat_completions;
pub mod provider;

pub use chat_completions::ChatCompletionsClient;
pub use provider::Provider;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sampling temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Completion service connection and sampling settings.
#[derive(Clone)]
pub struct LlmSettings {
    /// API root including the version segment (e.g., `https://openrouter.ai/api/v1`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `meta-llama/llama-3.3-70b-instruct`).
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Provider type (auto-detected from `base_url`).
    pub provider: Provider,
    /// Upstream request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Site URL sent to `OpenRouter` as `HTTP-Referer`.
    pub site_url: Option<String>,
    /// Application name sent to `OpenRouter` as `X-Title`.
    pub app_name: Option<String>,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("provider", &self.provider)
            .field("timeout", &self.timeout)
            .field("site_url", &self.site_url)
            .field("app_name", &self.app_name)
            .finish()
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instruction text prepended to every prompt.
    System,
    /// Human question.
    User,
    /// Model reply.
    Assistant,
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
}

impl Message {
    /// Create a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Failure of a call to the completion service.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("request to completion service failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status (auth, quota, bad model).
    #[error("completion service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The response could not be interpreted as a completion.
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

/// A client able to turn a prompt into generated text.
///
/// Sampling parameters (model, temperature) are fixed when the client is
/// constructed; callers only supply the prompt.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a reply for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an [`UpstreamError`] if the remote call fails or its reply
    /// cannot be decoded.
    async fn complete(&self, prompt: &[Message]) -> Result<String, UpstreamError>;
}
