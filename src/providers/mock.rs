/*!
 * Mock provider implementations for testing.
 *
 * This module provides a mock provider that simulates different behaviors:
 * - `MockProvider::echo()` - Returns the input unchanged (identity translation)
 * - `MockProvider::working()` - Always succeeds with tagged text
 * - `MockProvider::glossary_aware()` - Applies the glossary lines found in the instruction
 * - `MockProvider::failing()` / `empty()` / `slow()` / `intermittent()` - failure modes
 *
 * Every request is recorded so tests can assert on call counts and prompts.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, CompletionResponse, Provider, TokenUsage};

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Returns the user text unchanged
    Echo,
    /// Always succeeds with a tagged translation
    Working,
    /// Replaces glossary terms listed in the instruction
    GlossaryAware,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with an error
    Failing,
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter for intermittent failures
    request_count: Arc<AtomicUsize>,
    /// Every request received, in arrival order
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&CompletionRequest) -> String>,
    /// Cost reported with every successful response
    cost: Option<f64>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
            cost: None,
        }
    }

    /// Identity translation
    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Mock that honours `term: translation` lines of the instruction
    pub fn glossary_aware() -> Self {
        Self::new(MockBehavior::GlossaryAware)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that echoes after a delay
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator, used by the succeeding behaviors
    pub fn with_custom_response(mut self, generator: fn(&CompletionRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Report `cost` with every successful response
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Number of requests received so far
    pub fn call_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Snapshot of the received requests
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Parse `term: translation` lines between the glossary header and the closing sentence
    pub fn glossary_from_instruction(system: &str) -> Vec<(String, String)> {
        system
            .lines()
            .skip_while(|line| !line.contains("glossary"))
            .skip(1)
            .take_while(|line| !line.trim().is_empty())
            .filter_map(|line| line.split_once(": "))
            .map(|(term, translation)| (term.to_string(), translation.to_string()))
            .collect()
    }

    fn succeed(&self, request: &CompletionRequest) -> String {
        if let Some(generator) = self.custom_response {
            return generator(request);
        }
        match self.behavior {
            MockBehavior::Working => format!("[TRANSLATED] {}", request.user),
            MockBehavior::GlossaryAware => Self::glossary_from_instruction(&request.system)
                .iter()
                .fold(request.user.clone(), |text, (term, translation)| text.replace(term.as_str(), translation)),
            _ => request.user.clone(),
        }
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
            custom_response: self.custom_response,
            cost: self.cost,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let usage = TokenUsage::new(request.user.len() as u64, (request.user.len() / 2) as u64);
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),
            MockBehavior::Intermittent { fail_every } if count % fail_every == fail_every - 1 => {
                Err(ProviderError::ApiError {
                    message: format!("Simulated intermittent failure (request #{})", count + 1),
                    status_code: 503,
                })
            }
            MockBehavior::Empty => Ok(CompletionResponse {
                text: String::new(),
                usage: TokenUsage::default(),
                cost: self.cost,
            }),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(CompletionResponse {
                    text: self.succeed(&request),
                    usage,
                    cost: self.cost,
                })
            }
            _ => Ok(CompletionResponse {
                text: self.succeed(&request),
                usage,
                cost: self.cost,
            }),
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(ProviderError::ConnectionError("mock is failing".to_string())),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
