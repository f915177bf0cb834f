/*!
 * Tests for the provider implementations
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use yadtwai::app_config::{TranslationConfig, TranslationProvider};
use yadtwai::errors::ProviderError;
use yadtwai::providers::anthropic::{AnthropicRequest, AnthropicResponse};
use yadtwai::providers::mock::MockProvider;
use yadtwai::providers::ollama::{GenerationRequest, GenerationResponse, Ollama};
use yadtwai::providers::openai::{OpenAIRequest, OpenAIResponse};
use yadtwai::providers::{
    create_provider, is_retryable, with_retry, CompletionRequest, Provider, RateLimiter, RetryPolicy, TokenUsage,
};

fn quick_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff_base_ms: 0,
        rate_limit: None,
    }
}

#[tokio::test]
async fn test_mockProvider_working_shouldTagAndRecordRequests() {
    let provider = MockProvider::working();
    let response = provider
        .complete(CompletionRequest::new("Translate from French to English", "Bonjour"))
        .await
        .unwrap();

    assert_eq!(response.text, "[TRANSLATED] Bonjour");
    assert_eq!(provider.call_count(), 1);
    assert_eq!(provider.requests()[0].system, "Translate from French to English");
    assert!(response.usage.total().is_some());
}

#[tokio::test]
async fn test_mockProvider_glossaryAware_shouldApplyInstructionTerms() {
    let system = "You are a translation assistant.\nPlease use the following glossary for specific terms:\nchat: cat\nchien: dog\n\nTranslate the following text preserving the formatting:";
    let response = MockProvider::glossary_aware()
        .complete(CompletionRequest::new(system, "le chat et le chien"))
        .await
        .unwrap();
    assert_eq!(response.text, "le cat et le dog");
}

#[tokio::test]
async fn test_mockProvider_intermittent_shouldFailEveryNthRequest() {
    let provider = MockProvider::intermittent(3);
    let mut outcomes = Vec::new();
    for _ in 0..6 {
        outcomes.push(provider.complete(CompletionRequest::new("s", "u")).await.is_ok());
    }
    assert_eq!(outcomes, vec![true, true, false, true, true, false]);
}

#[tokio::test]
async fn test_mockProvider_clones_shouldShareCounters() {
    let provider = MockProvider::echo();
    let shared: Arc<dyn Provider> = Arc::new(provider.clone());
    shared.complete(CompletionRequest::new("s", "u")).await.unwrap();
    assert_eq!(provider.call_count(), 1);
    assert_eq!(shared.name(), "mock");
    assert_eq!(shared.model(), "mock-model");
}

#[tokio::test]
async fn test_mockProvider_failing_shouldFailConnectionTest() {
    assert!(MockProvider::failing().test_connection().await.is_err());
    assert!(MockProvider::empty().test_connection().await.is_ok());
}

#[test]
fn test_tokenUsage_total_shouldTreatMissingCountsAsZero() {
    assert_eq!(TokenUsage::new(10, 5).total(), Some(15));
    assert_eq!(TokenUsage::default().total(), None);
    let partial = TokenUsage {
        prompt_tokens: Some(7),
        completion_tokens: None,
    };
    assert_eq!(partial.total(), Some(7));
}

#[test]
fn test_isRetryable_shouldOnlyRetryTransientErrors() {
    assert!(is_retryable(&ProviderError::ConnectionError("reset".to_string())));
    assert!(is_retryable(&ProviderError::RateLimitExceeded("slow down".to_string())));
    assert!(is_retryable(&ProviderError::ApiError {
        status_code: 503,
        message: "unavailable".to_string()
    }));
    assert!(!is_retryable(&ProviderError::ApiError {
        status_code: 400,
        message: "bad request".to_string()
    }));
    assert!(!is_retryable(&ProviderError::AuthenticationError("bad key".to_string())));
    assert!(!is_retryable(&ProviderError::Timeout(5)));
}

#[test]
fn test_rateLimiter_withoutLimit_shouldBeUnlimited() {
    assert_eq!(RateLimiter::per_minute(None).interval(), None);
    assert_eq!(RateLimiter::per_minute(Some(0)).interval(), None);
    assert_eq!(RateLimiter::per_minute(Some(600)).interval(), Some(Duration::from_millis(100)));
}

#[tokio::test]
async fn test_rateLimiter_shouldSpaceFirstAttempts() {
    let limiter = RateLimiter::per_minute(Some(600));
    let started = tokio::time::Instant::now();

    for _ in 0..3 {
        let result = with_retry(quick_policy(0), "test", || {
            let limiter = limiter.clone();
            async move {
                limiter.acquire().await;
                Ok::<_, ProviderError>(())
            }
        })
        .await;
        assert!(result.is_ok());
    }

    // Three first attempts take three slots 100 ms apart
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_rateLimiter_concurrentClones_shouldShareSchedule() {
    let limiter = RateLimiter::per_minute(Some(600));
    let started = tokio::time::Instant::now();

    let calls = (0..3).map(|_| {
        let limiter = limiter.clone();
        async move { limiter.acquire().await }
    });
    futures::future::join_all(calls).await;

    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_withRetry_transientFailures_shouldEventuallySucceed() {
    let attempts = AtomicUsize::new(0);
    let result = with_retry(quick_policy(3), "test", || {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 2 {
                Err(ProviderError::ConnectionError("refused".to_string()))
            } else {
                Ok(attempt)
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), 2);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_withRetry_permanentFailure_shouldNotRetry() {
    let attempts = AtomicUsize::new(0);
    let result: Result<(), ProviderError> = with_retry(quick_policy(3), "test", || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async { Err(ProviderError::AuthenticationError("bad key".to_string())) }
    })
    .await;

    assert!(matches!(result, Err(ProviderError::AuthenticationError(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_withRetry_exhaustedRetries_shouldReturnLastError() {
    let attempts = AtomicUsize::new(0);
    let result: Result<(), ProviderError> = with_retry(quick_policy(2), "test", || {
        attempts.fetch_add(1, Ordering::SeqCst);
        async {
            Err(ProviderError::ApiError {
                status_code: 502,
                message: "bad gateway".to_string(),
            })
        }
    })
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn test_openAIRequest_shouldSerializeChatShape() {
    let request = OpenAIRequest::new("gpt-4o")
        .add_message("system", "Translate from French to English")
        .add_message("user", "Bonjour")
        .temperature(0.0);
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["model"], "gpt-4o");
    assert_eq!(json["messages"][0]["role"], "system");
    assert_eq!(json["messages"][1]["content"], "Bonjour");
    assert_eq!(json["temperature"], 0.0);
    assert!(json.get("max_tokens").is_none());
}

#[test]
fn test_openAIResponse_shouldExtractFirstChoice() {
    let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}],"usage":{"prompt_tokens":12,"completion_tokens":2}}"#;
    let response: OpenAIResponse = serde_json::from_str(body).unwrap();
    assert_eq!(response.extract_text(), Some("Hello"));
    assert_eq!(response.usage.unwrap().prompt_tokens, 12);
}

#[test]
fn test_anthropicRequest_shouldCarrySystemSeparately() {
    let request = AnthropicRequest::new("claude-3-5-haiku-latest", 1024)
        .system("Translate from French to English")
        .add_message("user", "Bonjour");
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["system"], "Translate from French to English");
    assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    assert_eq!(json["max_tokens"], 1024);
    assert!(json.get("temperature").is_none());
}

#[test]
fn test_anthropicResponse_shouldJoinTextBlocksOnly() {
    let body = r#"{"content":[{"type":"text","text":"Hello "},{"type":"tool_use"},{"type":"text","text":"world"}],"usage":{"input_tokens":3,"output_tokens":2}}"#;
    let response: AnthropicResponse = serde_json::from_str(body).unwrap();
    assert_eq!(response.extract_text(), "Hello world");
}

#[test]
fn test_ollamaGenerationRequest_shouldDisableStreaming() {
    let request = GenerationRequest::new("llama3.2:3b", "Bonjour")
        .system("Translate")
        .temperature(0.0)
        .num_predict(256);
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["stream"], false);
    assert_eq!(json["options"]["num_predict"], 256);
    assert_eq!(json["system"], "Translate");
}

#[test]
fn test_ollamaGenerationResponse_parseStream_shouldConcatenatePieces() {
    let body = concat!(
        r#"{"model":"m","response":"Hel","done":false}"#,
        "\n",
        r#"{"model":"m","response":"lo","done":false}"#,
        "\n",
        r#"{"model":"m","response":"","done":true,"prompt_eval_count":9,"eval_count":2}"#,
        "\n"
    );
    let response = GenerationResponse::parse(body).unwrap();
    assert_eq!(response.response, "Hello");
    assert!(response.done);
    assert_eq!(response.eval_count, Some(2));

    assert!(GenerationResponse::parse("").is_err());
    assert!(GenerationResponse::parse("{ broken").is_err());
}

#[test]
fn test_createProvider_shouldFollowConfiguredProvider() {
    let mut config = TranslationConfig::default();
    let ollama = create_provider(&config).unwrap();
    assert_eq!(ollama.model(), "llama3.2:3b");

    config.provider = TranslationProvider::LMStudio;
    config.provider_config_mut(&TranslationProvider::LMStudio).model = "qwen2.5-7b-instruct".to_string();
    let lmstudio = create_provider(&config).unwrap();
    assert_eq!(lmstudio.name(), "lmstudio");
    assert_eq!(lmstudio.model(), "qwen2.5-7b-instruct");
}

/// Needs a local Ollama server
#[tokio::test]
#[ignore]
async fn test_ollama_provider_withLocalServer_shouldTranslate() {
    let client = Ollama::new_with_config("http://localhost:11434", "llama3.2:3b", RetryPolicy::default(), Duration::from_secs(60))
        .unwrap();
    if client.test_connection().await.is_err() {
        return;
    }
    let response = client
        .complete(CompletionRequest::new("Translate from French to English. Answer with the translation only.", "Bonjour"))
        .await
        .unwrap();
    assert!(!response.text.trim().is_empty());
}
