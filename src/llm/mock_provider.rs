// src/llm/mock_provider.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{FunctionMetadata, ProviderError, SuggestionProvider};
use crate::types::{Impact, Suggestion};

/// Offline provider with canned answers per function name.
pub struct MockProvider {
    responses: HashMap<String, Vec<Suggestion>>,
    default_response: Vec<Suggestion>,
    call_count: AtomicUsize,
    should_fail: bool,
    delay: Option<Duration>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default_response: vec![Suggestion::generated(
                "Pack related storage variables into a single slot.",
                0.8,
                Impact::High,
            )],
            call_count: AtomicUsize::new(0),
            should_fail: false,
            delay: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    /// Answers after `delay`, for exercising timeouts.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn with_response(mut self, function: &str, suggestions: Vec<Suggestion>) -> Self {
        self.responses.insert(function.to_string(), suggestions);
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SuggestionProvider for MockProvider {
    async fn generate(
        &self,
        _function_text: &str,
        metadata: &FunctionMetadata,
    ) -> Result<Vec<Suggestion>, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(ProviderError::Unavailable("mock provider failure".to_string()));
        }

        Ok(self
            .responses
            .get(&metadata.name)
            .unwrap_or(&self.default_response)
            .clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
