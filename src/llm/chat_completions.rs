//! `OpenAI` Chat Completions API client.
//!
//! This module implements [`CompletionClient`] against the Chat Completions
//! API (`/chat/completions`) using a single non-streaming request per call.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::provider::AuthScheme;
use super::{CompletionClient, LlmSettings, Message, UpstreamError};

/// Longest upstream error body kept in an [`UpstreamError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [Message],
    temperature: f64,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Some gateways (`OpenRouter` among them) report failures inside a 200 body.
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<u16>,
}

/// Client for the `OpenAI` Chat Completions API.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    settings: LlmSettings,
    url: String,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("url", &self.url)
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatCompletionsClient {
    /// Create a new client with the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    /// (e.g., TLS backend initialization fails).
    pub fn new(settings: LlmSettings) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let url = settings
            .provider
            .build_chat_url(&settings.base_url, &settings.model);

        Ok(Self {
            http: builder.build()?,
            settings,
            url,
        })
    }

    /// The resolved chat completions endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(&self, prompt: &[Message]) -> reqwest::RequestBuilder {
        let provider = &self.settings.provider;
        let body = ChatCompletionBody {
            model: provider
                .sends_model_in_body()
                .then_some(self.settings.model.as_str()),
            messages: prompt,
            temperature: self.settings.temperature,
            stream: false,
        };

        let mut rb = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.settings.api_key {
            rb = match provider.auth_scheme() {
                AuthScheme::Bearer => rb.bearer_auth(key),
                AuthScheme::ApiKeyHeader => rb.header("api-key", key),
            };
        }
        if provider.supports_attribution() {
            if let Some(site) = &self.settings.site_url {
                rb = rb.header("HTTP-Referer", site);
            }
            if let Some(name) = &self.settings.app_name {
                rb = rb.header("X-Title", name);
            }
        }
        rb
    }
}

#[async_trait::async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(&self, prompt: &[Message]) -> Result<String, UpstreamError> {
        let started = Instant::now();
        tracing::debug!(
            name: "llm.request",
            url = %self.url,
            model = %self.settings.model,
            message_count = prompt.len(),
            "Sending completion request"
        );

        let resp = self.request(prompt).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                elapsed_ms = started.elapsed().as_millis(),
                "Completion service returned an error status"
            );
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY_CHARS),
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| UpstreamError::MalformedResponse(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(UpstreamError::Status {
                status: err.code.unwrap_or_else(|| status.as_u16()),
                body: truncate(&err.message, MAX_ERROR_BODY_CHARS),
            });
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                UpstreamError::MalformedResponse("response contained no message content".into())
            })?;

        tracing::debug!(
            model = %self.settings.model,
            content_length = content.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "Completion received"
        );

        Ok(content)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
