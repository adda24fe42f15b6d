// src/llm/client.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::parse::{OPTIMIZATION_PROMPT, SYSTEM_PROMPT, build_prompt, parse_output};
use super::{FunctionMetadata, ProviderError, SuggestionCache, SuggestionProvider};
use crate::config::LlmConfig;
use crate::types::Suggestion;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

/// Provider backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    cache: SuggestionCache,
}

impl OpenAiProvider {
    /// Builds a provider from configuration. A missing API key is allowed
    /// (local endpoints often need none); the server decides.
    pub fn new(config: &LlmConfig, cache: SuggestionCache) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            debug!("{} is not set, sending requests without a key", config.api_key_env);
        }

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            cache,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("response has no choices".to_string()))
    }
}

#[async_trait]
impl SuggestionProvider for OpenAiProvider {
    async fn generate(
        &self,
        function_text: &str,
        metadata: &FunctionMetadata,
    ) -> Result<Vec<Suggestion>, ProviderError> {
        let key = SuggestionCache::key(OPTIMIZATION_PROMPT, function_text);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        info!("Requesting suggestions for `{}` from {}", metadata.name, self.model);
        let output = self.complete(&build_prompt(function_text, metadata)).await?;
        let suggestions = parse_output(&output);

        self.cache.put(&key, &suggestions);
        Ok(suggestions)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
