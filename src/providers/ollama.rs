use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{
    status_error, transport_error, with_retry, CompletionRequest, CompletionResponse, Embedder, Provider,
    RateLimiter, RetryPolicy, TokenUsage,
};
use crate::errors::ProviderError;

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// HTTP client for making requests
    client: Client,
    /// Model used for generation and embeddings
    model: String,
    /// Retry behaviour
    policy: RetryPolicy,
    /// Request spacing shared by all calls through this client
    limiter: RateLimiter,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerationOptions>,
    /// Whether to stream the response
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

/// Generation options for the Ollama API
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Temperature for generation (default: 0.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Generation response from the Ollama API
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    #[serde(default)]
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of prompt tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    /// Number of generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
}

/// Embeddings request for the Ollama API
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// Embeddings response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct EmbeddingResponse {
    /// Embedding vector
    pub embedding: Vec<f32>,
}

impl GenerationRequest {
    /// Create a new non-streaming generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system: None,
            options: None,
            stream: Some(false),
        }
    }

    /// Set the system prompt
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).temperature = Some(temperature);
        self
    }

    /// Cap the number of generated tokens
    pub fn num_predict(mut self, num_predict: u32) -> Self {
        self.options.get_or_insert_with(GenerationOptions::default).num_predict = Some(num_predict);
        self
    }
}

impl GenerationResponse {
    /// Parse a response body, accepting both a single object and a JSONL stream
    pub fn parse(body: &str) -> Result<Self, ProviderError> {
        if let Ok(response) = serde_json::from_str::<GenerationResponse>(body) {
            return Ok(response);
        }

        // Streaming bodies: concatenate every `response` piece, counts come from the final line
        let mut text = String::new();
        let mut last: Option<GenerationResponse> = None;
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            let part: GenerationResponse = serde_json::from_str(line).map_err(|e| {
                error!(
                    "Failed to parse Ollama API response: {}. Raw response (first 500 chars): {}",
                    e,
                    body.chars().take(500).collect::<String>()
                );
                ProviderError::ParseError(e.to_string())
            })?;
            text.push_str(&part.response);
            last = Some(part);
        }

        match last {
            Some(mut response) => {
                response.response = text;
                response.done = true;
                Ok(response)
            }
            None => Err(ProviderError::ParseError("empty response body".to_string())),
        }
    }
}

impl Ollama {
    /// Create a new Ollama client from a complete URL
    pub fn from_url(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            model: model.into(),
            policy: RetryPolicy::default(),
            limiter: RateLimiter::default(),
        }
    }

    /// Create a new Ollama client with configuration
    ///
    /// Ollama speaks HTTP/1.1, so the client keeps a pool of idle connections for
    /// parallel unit translations instead of negotiating HTTP/2.
    pub fn new_with_config(endpoint: &str, model: impl Into<String>, policy: RetryPolicy, timeout: Duration) -> Result<Self> {
        let base_url = normalize_endpoint(endpoint)?;

        Ok(Self {
            base_url,
            client: Client::builder()
                .timeout(timeout)
                .http1_only()
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(20)
                .tcp_keepalive(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            model: model.into(),
            limiter: RateLimiter::per_minute(policy.rate_limit),
            policy,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate text from the Ollama API with retry logic
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let url = url.as_str();

        with_retry(self.policy, "Ollama", move || async move {
            self.limiter.acquire().await;
            let response = self
                .client
                .post(url)
                .json(request)
                .send()
                .await
                .map_err(transport_error)?;

            let status = response.status();
            let body = response.text().await.map_err(transport_error)?;
            if !status.is_success() {
                return Err(status_error(status, body));
            }
            GenerationResponse::parse(&body)
        })
        .await
    }

    /// Generate embeddings from the Ollama API
    pub async fn embeddings(&self, prompt: &str) -> Result<EmbeddingResponse, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt,
        };

        let response = self
            .client
            .post(&url)
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
            .map_err(|e| ProviderError::ParseError(format!("Ollama embeddings: {}", e)))?;
        if parsed.embedding.is_empty() {
            return Err(ProviderError::ParseError("Ollama returned an empty embedding".to_string()));
        }
        Ok(parsed)
    }

    /// Get the Ollama API version
    pub async fn version(&self) -> Result<String, ProviderError> {
        let url = format!("{}/api/version", self.base_url);
        let response: serde_json::Value = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(transport_error)?
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        response["version"]
            .as_str()
            .map(|v| v.to_string())
            .ok_or_else(|| ProviderError::ParseError("Invalid version format in response".to_string()))
    }
}

/// Accept "host", "host:port" or a full URL; default to port 11434
fn normalize_endpoint(endpoint: &str) -> Result<String> {
    if endpoint.trim().is_empty() {
        return Err(anyhow!("Endpoint cannot be empty"));
    }

    let with_scheme = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };
    let mut url = Url::parse(&with_scheme)?;
    if url.host_str().is_none() {
        return Err(anyhow!("Invalid host in endpoint: {}", endpoint));
    }
    let explicit_port = with_scheme
        .split("://")
        .nth(1)
        .map(|rest| rest.split('/').next().unwrap_or("").contains(':'))
        .unwrap_or(false);
    if !explicit_port {
        url.set_port(Some(11434)).map_err(|_| anyhow!("Cannot set port on endpoint: {}", endpoint))?;
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[async_trait]
impl Provider for Ollama {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let generation = GenerationRequest::new(&self.model, request.user)
            .system(request.system)
            .temperature(request.temperature)
            .num_predict(request.max_tokens);

        let response = self.generate(&generation).await?;
        debug!("Ollama generated {} chars", response.response.len());

        Ok(CompletionResponse {
            text: response.response,
            usage: TokenUsage {
                prompt_tokens: response.prompt_eval_count,
                completion_tokens: response.eval_count,
            },
            cost: None,
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.version().await.map(|_| ())
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for Ollama {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        Ok(self.embeddings(text).await?.embedding)
    }
}
