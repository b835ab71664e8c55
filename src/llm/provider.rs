//! Provider-specific configuration and detection.
//!
//! Providers differ in how the chat completions URL is built and how the
//! API key is presented.

/// Default Azure `OpenAI` API version.
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-08-01-preview";

/// Supported completion providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Groq (groq.com)
    Groq,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// Deployment name (takes the place of the model in the URL)
        deployment_name: String,
        /// API version (e.g., "2024-08-01-preview")
        api_version: String,
    },
    /// Generic OpenAI-compatible provider
    Generic,
}

/// How the API key is attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>`
    ApiKeyHeader,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// Azure detection leaves the deployment name empty; the model name is
    /// used in its place when building the URL.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let provider = Provider::detect_from_url("https://openrouter.ai/api/v1");
    /// assert_eq!(provider, Provider::OpenRouter);
    /// ```
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let lower = base_url.to_lowercase();

        if lower.contains("openrouter.ai") {
            Self::OpenRouter
        } else if lower.contains("openai.azure.com") {
            Self::AzureOpenAI {
                deployment_name: String::new(),
                api_version: DEFAULT_AZURE_API_VERSION.to_string(),
            }
        } else if lower.contains("groq.com") {
            Self::Groq
        } else if lower.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Build the chat completions URL for this provider.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root including any version segment
    /// * `model` - Used as the deployment name for Azure when none is set
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str, model: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => {
                let deployment = if deployment_name.is_empty() {
                    model
                } else {
                    deployment_name
                };
                format!(
                    "{base}/openai/deployments/{deployment}/chat/completions?api-version={api_version}"
                )
            }
            _ => format!("{base}/chat/completions"),
        }
    }

    /// How this provider expects the API key.
    #[must_use]
    pub fn auth_scheme(&self) -> AuthScheme {
        match self {
            Self::AzureOpenAI { .. } => AuthScheme::ApiKeyHeader,
            _ => AuthScheme::Bearer,
        }
    }

    /// Whether the provider accepts `HTTP-Referer` / `X-Title` attribution headers.
    #[must_use]
    pub fn supports_attribution(&self) -> bool {
        matches!(self, Self::OpenRouter)
    }

    /// Whether the request body must carry the model name.
    #[must_use]
    pub fn sends_model_in_body(&self) -> bool {
        !matches!(self, Self::AzureOpenAI { .. })
    }
}
