// src/llm/mod.rs
//! Generative suggestion providers.
//!
//! A provider turns one function's text into free-form suggestions. The
//! analyzer treats every provider error as non-fatal and falls back to the
//! static rules alone.

pub mod cache;
pub mod client;
pub mod mock_provider;
pub mod parse;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Function, PatternKind, Suggestion};

pub use cache::SuggestionCache;
pub use client::OpenAiProvider;
pub use mock_provider::MockProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// What a provider is told about the function besides its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionMetadata {
    pub name: String,
    pub patterns: Vec<PatternKind>,
}

impl From<&Function> for FunctionMetadata {
    fn from(function: &Function) -> Self {
        Self {
            name: function.name.clone(),
            patterns: function.patterns.iter().map(|p| p.kind).collect(),
        }
    }
}

#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Suggestions for one function. Every returned suggestion has
    /// `source = llm`.
    async fn generate(
        &self,
        function_text: &str,
        metadata: &FunctionMetadata,
    ) -> Result<Vec<Suggestion>, ProviderError>;

    fn name(&self) -> &str;
}
