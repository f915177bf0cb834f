/*!
 * Core translation service implementation.
 *
 * This module contains the `TranslationService`, which turns one text unit
 * into its translation: the unit is chunked on paragraph boundaries, each
 * segment is sent to the provider with the glossary-aware instruction, and
 * the translated segments are joined back together.
 *
 * Every call runs under the configured timeout, is reported to the
 * telemetry observer and is counted in the shared token usage statistics.
 */

use chrono::Utc;
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::cache::TranslationCache;
use super::chunker;
use super::prompts::{self, Glossary, PromptTemplate};
use super::telemetry::{report_generation, GenerationRecord, NoopObserver, Observer};
use crate::app_config::TranslationConfig;
use crate::document::{xlsx, TextUnit, UnitAddress};
use crate::errors::{ProviderError, TranslationError};
use crate::providers::{CompletionRequest, Provider, TokenUsage};

/// Token usage statistics for tracking API consumption
#[derive(Debug, Clone)]
pub struct TokenUsageStats {
    /// Number of prompt tokens
    pub prompt_tokens: u64,

    /// Number of completion tokens
    pub completion_tokens: u64,

    /// Total number of tokens
    pub total_tokens: u64,

    /// Number of completion calls
    pub requests: u64,

    /// Start time of token tracking
    pub start_time: Instant,

    /// Total time spent on API requests
    pub api_duration: Duration,

    /// Provider name
    pub provider: String,

    /// Model name
    pub model: String,
}

impl Default for TokenUsageStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenUsageStats {
    /// Create a new empty token usage stats instance
    pub fn new() -> Self {
        Self::with_provider_info(String::new(), String::new())
    }

    /// Create new token usage stats with provider info
    pub fn with_provider_info(provider: String, model: String) -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            requests: 0,
            start_time: Instant::now(),
            api_duration: Duration::from_secs(0),
            provider,
            model,
        }
    }

    /// Add the usage of one call
    pub fn add_token_usage(&mut self, prompt_tokens: Option<u64>, completion_tokens: Option<u64>) {
        if let Some(pt) = prompt_tokens {
            self.prompt_tokens += pt;
            self.total_tokens += pt;
        }

        if let Some(ct) = completion_tokens {
            self.completion_tokens += ct;
            self.total_tokens += ct;
        }
    }

    fn record_call(&mut self, usage: &TokenUsage, duration: Duration) {
        self.add_token_usage(usage.prompt_tokens, usage.completion_tokens);
        self.requests += 1;
        self.api_duration += duration;
    }

    /// Calculate tokens per minute rate
    pub fn tokens_per_minute(&self) -> f64 {
        // API time when known, wall clock otherwise
        let duration_minutes = if self.api_duration.as_secs_f64() > 0.0 {
            self.api_duration.as_secs_f64() / 60.0
        } else {
            self.start_time.elapsed().as_secs_f64() / 60.0
        };

        if duration_minutes > 0.0 {
            self.total_tokens as f64 / duration_minutes
        } else {
            0.0
        }
    }

    /// Generate a summary of token usage
    pub fn summary(&self) -> String {
        let elapsed_minutes = self.start_time.elapsed().as_secs_f64() / 60.0;
        let api_minutes = self.api_duration.as_secs_f64() / 60.0;

        format!(
            "Token Usage Summary:\n\
             Provider: {}\n\
             Model: {}\n\
             Requests: {}\n\
             Prompt tokens: {}\n\
             Completion tokens: {}\n\
             Total tokens: {}\n\
             Elapsed time: {:.2} minutes\n\
             API request time: {:.2} minutes\n\
             Tokens per minute: {:.2}",
            self.provider,
            self.model,
            self.requests,
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens,
            elapsed_minutes,
            api_minutes,
            self.tokens_per_minute()
        )
    }
}

/// One unit of text to translate
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub text: String,
    pub source_language: String,
    pub target_language: String,
    pub glossary: Option<Glossary>,
    /// Where the text comes from, used in errors and telemetry
    pub address: Option<UnitAddress>,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            glossary: None,
            address: None,
        }
    }

    /// Request for a unit extracted from a document
    pub fn for_unit(unit: &TextUnit, source_language: &str, target_language: &str, glossary: Option<&Glossary>) -> Self {
        Self {
            text: unit.content.clone(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            glossary: glossary.cloned(),
            address: Some(unit.address.clone()),
        }
    }

    pub fn with_glossary(mut self, glossary: Glossary) -> Self {
        self.glossary = Some(glossary);
        self
    }

    fn address_label(&self) -> String {
        self.address
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "text".to_string())
    }
}

/// Main translation service for document units
#[derive(Debug, Clone)]
pub struct TranslationService {
    /// Completion capability
    provider: Arc<dyn Provider>,

    /// Configuration for the translation service
    pub config: TranslationConfig,

    /// Translation cache for storing and retrieving translations
    pub cache: TranslationCache,

    /// Receiver of generation records
    observer: Arc<dyn Observer>,

    /// Trace the generations of this service belong to
    trace_id: Option<String>,

    /// Usage accumulated over every call made through this service and its clones
    usage: Arc<Mutex<TokenUsageStats>>,
}

impl TranslationService {
    /// Create a new translation service around a provider
    pub fn new(provider: Arc<dyn Provider>, config: TranslationConfig) -> Self {
        let usage = TokenUsageStats::with_provider_info(provider.name().to_string(), provider.model().to_string());
        Self {
            cache: TranslationCache::new(config.common.cache_enabled),
            provider,
            config,
            observer: Arc::new(NoopObserver),
            trace_id: None,
            usage: Arc::new(Mutex::new(usage)),
        }
    }

    /// Report calls to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Attach generations to a trace
    pub fn with_trace(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Snapshot of the accumulated token usage
    pub fn usage_stats(&self) -> TokenUsageStats {
        self.usage.lock().clone()
    }

    /// Translate a plain string
    pub async fn translate_text(&self, text: &str, source_language: &str, target_language: &str) -> Result<String, TranslationError> {
        self.translate_unit(&TranslationRequest::new(text, source_language, target_language))
            .await
    }

    /// Translate one unit
    ///
    /// Blank input is returned unchanged without calling the provider.
    /// Whole-sheet units are sent in one call and forced back into the
    /// source grid shape; everything else is chunked on paragraph boundaries.
    pub async fn translate_unit(&self, request: &TranslationRequest) -> Result<String, TranslationError> {
        if request.text.trim().is_empty() {
            return Ok(request.text.clone());
        }

        let instruction = prompts::build_with_template(
            self.config.common.system_prompt.as_deref(),
            &request.source_language,
            &request.target_language,
            request.glossary.as_ref(),
        );

        if matches!(request.address, Some(UnitAddress::Sheet { .. })) {
            return self.translate_grid(request, &instruction).await;
        }

        let segments = chunker::chunk(&request.text, self.config.get_max_chars_per_request());
        if segments.len() > 1 {
            debug!("{} split into {} segments", request.address_label(), segments.len());
        }

        let mut translated = Vec::with_capacity(segments.len());
        for segment in &segments {
            translated.push(self.translate_segment(request, segment, &instruction).await?);
        }
        Ok(chunker::join(&translated))
    }

    async fn translate_segment(&self, request: &TranslationRequest, segment: &str, instruction: &str) -> Result<String, TranslationError> {
        if segment.trim().is_empty() {
            return Ok(segment.to_string());
        }
        let body = segment.trim_end();
        let trailing = &segment[body.len()..];

        let cached = self
            .cache
            .get(body, &request.source_language, &request.target_language, instruction);
        let translated = match cached {
            Some(hit) => hit,
            None => {
                let output = self.complete("translate", request, instruction, body).await?;
                let output = output.trim().to_string();
                self.cache
                    .store(body, &request.source_language, &request.target_language, instruction, &output);
                output
            }
        };

        Ok(format!("{}{}", translated, trailing))
    }

    async fn translate_grid(&self, request: &TranslationRequest, instruction: &str) -> Result<String, TranslationError> {
        let instruction = format!("{}\n{}", instruction, PromptTemplate::KEEP_SEPARATORS);
        let output = self.complete("translate_sheet", request, &instruction, &request.text).await?;

        let (rows, columns) = xlsx::grid_shape(&request.text);
        let (returned_rows, returned_columns) = xlsx::grid_shape(output.trim_matches(|c| c == '\n' || c == '\r'));
        if (returned_rows, returned_columns) != (rows, columns) {
            debug!(
                "{} came back as {}x{} instead of {}x{}, reshaping",
                request.address_label(),
                returned_rows,
                returned_columns,
                rows,
                columns
            );
        }
        Ok(xlsx::join_grid(&xlsx::reshape_grid(&output, rows, columns)))
    }

    /// One provider call under the configured timeout
    async fn complete(&self, name: &str, request: &TranslationRequest, instruction: &str, text: &str) -> Result<String, TranslationError> {
        let address = request.address_label();
        let completion = CompletionRequest::new(instruction, text).temperature(self.config.common.temperature);
        let timeout_secs = self.config.get_timeout_secs();

        let started = Instant::now();
        let response = match tokio::time::timeout(Duration::from_secs(timeout_secs), self.provider.complete(completion)).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => return Err(TranslationError::Service { address, source }),
            Err(_) => {
                return Err(TranslationError::Service {
                    address,
                    source: ProviderError::Timeout(timeout_secs),
                });
            }
        };
        let latency = started.elapsed();

        self.usage.lock().record_call(&response.usage, latency);
        report_generation(
            self.observer.as_ref(),
            &GenerationRecord {
                span_id: Uuid::new_v4().to_string(),
                trace_id: self.trace_id.clone(),
                name: name.to_string(),
                address: address.clone(),
                input: text.to_string(),
                output: response.text.clone(),
                usage: response.usage,
                cost: response.cost,
                latency,
                model: self.provider.model().to_string(),
                provider: self.provider.name().to_string(),
                finished_at: Utc::now(),
            },
        );

        if response.text.trim().is_empty() {
            return Err(TranslationError::EmptyResult { address });
        }
        Ok(response.text)
    }
}
