/*!
 * Provider implementations for different completion services.
 *
 * This module contains client implementations for various LLM providers:
 * - Ollama: Local LLM server
 * - OpenAI: OpenAI API integration (also used for LM Studio)
 * - Anthropic: Anthropic API integration
 * - Mock: scriptable provider for tests and dry runs
 *
 * The pipeline only sees the object-safe `Provider` and `Embedder` traits, so
 * any client can be passed around as `Arc<dyn Provider>`.
 */

use async_trait::async_trait;
use log::{debug, error, warn};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

/// A single instruction + text completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System instruction
    pub system: String,
    /// User content (the text to translate)
    pub user: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.0,
            max_tokens: 4096,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Token counts reported by a provider, when it exposes them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
        }
    }

    pub fn total(&self) -> Option<u64> {
        match (self.prompt_tokens, self.completion_tokens) {
            (None, None) => None,
            (p, c) => Some(p.unwrap_or(0) + c.unwrap_or(0)),
        }
    }
}

/// Result of a completion call
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Token usage, if exposed by the service
    pub usage: TokenUsage,
    /// Billed cost of the call, if the service reports one
    pub cost: Option<f64>,
}

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably in the translation service.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Complete a request using this provider
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Short provider identifier used in logs and telemetry
    fn name(&self) -> &str;

    /// Model the provider sends requests to
    fn model(&self) -> &str;
}

/// Text embedding capability used by semantic scoring
#[async_trait]
pub trait Embedder: Send + Sync + Debug {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Retry behaviour shared by the HTTP clients
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Base backoff time in milliseconds, doubled on each retry
    pub backoff_base_ms: u64,
    /// Optional rate limit in requests per minute, enforced by `RateLimiter`
    pub rate_limit: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1000,
            rate_limit: None,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_retries: config.common.retry_count,
            backoff_base_ms: config.common.retry_backoff_ms,
            rate_limit: config.get_rate_limit(),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(1u64 << exponent))
    }
}

/// Spaces request starts at least `60 / rpm` seconds apart
///
/// Clones share the schedule, so one limiter covers every concurrent call
/// made through the same client. Retries take a slot like any other request.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    interval: Option<Duration>,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// `None` or zero means unlimited
    pub fn per_minute(rate_limit: Option<u32>) -> Self {
        Self {
            interval: rate_limit
                .filter(|rpm| *rpm > 0)
                .map(|rpm| Duration::from_millis(60_000 / rpm as u64)),
            next_slot: Arc::default(),
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Wait for the next free slot
    pub async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };
        let wait = {
            let mut next_slot = self.next_slot.lock();
            let now = Instant::now();
            let slot = next_slot.map_or(now, |next| next.max(now));
            *next_slot = Some(slot + interval);
            slot.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            debug!("Rate limit: waiting {} ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
    }
}

/// Whether an error is worth another attempt
pub fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::ConnectionError(_) | ProviderError::RateLimitExceeded(_) => true,
        ProviderError::ApiError { status_code, .. } => *status_code >= 500,
        _ => false,
    }
}

/// Run `operation` with exponential backoff on retryable errors
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut operation: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) && attempt < policy.max_retries => {
                attempt += 1;
                warn!("{} request failed: {} - attempt {}/{}", label, e, attempt, policy.max_retries + 1);
                tokio::time::sleep(policy.backoff(attempt)).await;
            }
            Err(e) => {
                error!("{} request failed: {}", label, e);
                return Err(e);
            }
        }
    }
}

/// Map a non-success HTTP status to a provider error
pub fn status_error(status: reqwest::StatusCode, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationError(body),
        429 => ProviderError::RateLimitExceeded(body),
        code => ProviderError::ApiError {
            status_code: code,
            message: body,
        },
    }
}

/// Map a transport error to a provider error
pub fn transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_connect() || error.is_timeout() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

/// Build the completion client selected in the configuration
pub fn create_provider(config: &TranslationConfig) -> anyhow::Result<Arc<dyn Provider>> {
    let policy = RetryPolicy::from_config(config);
    let model = config.get_model();
    let endpoint = config.get_endpoint();
    let timeout = Duration::from_secs(config.get_timeout_secs());

    let provider: Arc<dyn Provider> = match config.provider {
        TranslationProvider::Ollama => Arc::new(ollama::Ollama::new_with_config(&endpoint, model, policy, timeout)?),
        TranslationProvider::OpenAI => Arc::new(openai::OpenAI::new_with_config(
            config.get_api_key(),
            endpoint,
            model,
            policy,
            timeout,
        )),
        TranslationProvider::LMStudio => {
            // LM Studio does not check keys but the OpenAI wire format wants one
            let api_key = Some(config.get_api_key())
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| "lm-studio".to_string());
            Arc::new(
                openai::OpenAI::new_with_config(api_key, endpoint, model, policy, timeout).named("lmstudio"),
            )
        }
        TranslationProvider::Anthropic => Arc::new(anthropic::Anthropic::new_with_config(
            config.get_api_key(),
            endpoint,
            model,
            policy,
            timeout,
        )),
    };

    Ok(provider)
}
