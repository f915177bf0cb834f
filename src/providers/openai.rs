use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    status_error, transport_error, with_retry, CompletionRequest, CompletionResponse, Embedder, Provider,
    RateLimiter, RetryPolicy, TokenUsage,
};
use crate::errors::ProviderError;

/// Client for the OpenAI chat completions API and compatible servers (LM Studio)
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key sent as bearer token
    api_key: String,
    /// Base URL, e.g. https://api.openai.com/v1
    endpoint: String,
    /// Chat model
    model: String,
    /// Model used by `embed`, defaults to the chat model
    embedding_model: Option<String>,
    /// Identifier reported by `Provider::name`
    name: &'static str,
    /// Retry behaviour
    policy: RetryPolicy,
    /// Request spacing shared by all calls through this client
    limiter: RateLimiter,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: String,
    pub content: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
    #[serde(default)]
    pub usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
pub struct OpenAIUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Reported by some compatible gateways, in credits or USD
    #[serde(default)]
    pub cost: Option<f64>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAIRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(OpenAIMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

impl OpenAIResponse {
    /// Text of the first choice
    pub fn extract_text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

impl OpenAI {
    /// Create a new OpenAI client with configuration
    pub fn new_with_config(
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        model: impl Into<String>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Self {
        let endpoint = endpoint.into();
        Self {
            client: Client::builder()
                .timeout(timeout)
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: if endpoint.is_empty() {
                "https://api.openai.com/v1".to_string()
            } else {
                endpoint.trim_end_matches('/').to_string()
            },
            model: model.into(),
            embedding_model: None,
            name: "openai",
            limiter: RateLimiter::per_minute(policy.rate_limit),
            policy,
        }
    }

    /// Report a different provider name (used for LM Studio)
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Use a dedicated embedding model
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Send a chat completion request with retry logic
    pub async fn chat(&self, request: &OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let url = url.as_str();

        with_retry(self.policy, self.name, move || async move {
            self.limiter.acquire().await;
            let response = self
                .client
                .post(url)
                .bearer_auth(&self.api_key)
                .json(request)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error(status, body));
            }

            response
                .json::<OpenAIResponse>()
                .await
                .map_err(|e| ProviderError::ParseError(e.to_string()))
        })
        .await
    }
}

#[async_trait]
impl Provider for OpenAI {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let chat = OpenAIRequest::new(&self.model)
            .add_message("system", request.system)
            .add_message("user", request.user)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens);

        let response = self.chat(&chat).await?;
        let text = response
            .extract_text()
            .ok_or_else(|| ProviderError::ParseError("response contained no choices".to_string()))?
            .to_string();
        let cost = response.usage.as_ref().and_then(|u| u.cost);
        let usage = response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(CompletionResponse { text, usage, cost })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let request = OpenAIRequest::new(&self.model)
            .add_message("user", "Hello")
            .max_tokens(5);
        self.chat(&request).await.map(|_| ())
    }

    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for OpenAI {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/embeddings", self.endpoint);
        let request = EmbeddingRequest {
            model: self.embedding_model.as_deref().unwrap_or(&self.model),
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::ParseError("embedding response contained no data".to_string()))
    }
}
