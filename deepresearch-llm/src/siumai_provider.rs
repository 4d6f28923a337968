//! Completion provider backed by the siumai framework
//!
//! Supports the openai, anthropic, ollama and groq providers. Credentials
//! come from the [`LlmConfig`] handed in by the caller only.

use crate::normalize::parse_structured;
use crate::provider::{system_with_schema, CompletionProvider};
use crate::schema::StructuredSchema;
use async_trait::async_trait;
use deepresearch_core::{
    config_error, performance, with_timeout, ErrorContext, LlmConfig, ResearchError,
    ResearchResult,
};
use siumai::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

pub struct SiumaiCompletionProvider {
    client: Box<dyn LlmClient>,
    provider: String,
    model: String,
    timeout_ms: u64,
}

impl SiumaiCompletionProvider {
    pub async fn new(config: &LlmConfig) -> ResearchResult<Self> {
        let client = Self::build_client(config).await?;

        info!(
            "Created siumai client for provider: {} with model: {}",
            config.provider, config.model
        );

        Ok(Self {
            client,
            provider: config.provider.clone(),
            model: config.model.clone(),
            timeout_ms: config.timeout_seconds.saturating_mul(1000),
        })
    }

    fn require_api_key(config: &LlmConfig) -> ResearchResult<String> {
        config.api_key.clone().ok_or_else(|| {
            config_error!(
                format!("API key for provider '{}' not configured", config.provider),
                "siumai_provider"
            )
        })
    }

    fn build_error(provider: &str, error: impl std::fmt::Display) -> ResearchError {
        ResearchError::Config {
            message: format!("Failed to build {} client: {}", provider, error),
            source: None,
            context: ErrorContext::new("siumai_provider").with_operation("build_client"),
        }
    }

    async fn build_client(config: &LlmConfig) -> ResearchResult<Box<dyn LlmClient>> {
        match config.provider.as_str() {
            "openai" => {
                let api_key = Self::require_api_key(config)?;

                let mut builder = LlmBuilder::new()
                    .openai()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| Self::build_error("OpenAI", e))?;

                Ok(Box::new(client))
            }
            "anthropic" => {
                let api_key = Self::require_api_key(config)?;

                let mut builder = LlmBuilder::new()
                    .anthropic()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| Self::build_error("Anthropic", e))?;

                Ok(Box::new(client))
            }
            "ollama" => {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());

                let mut builder = LlmBuilder::new()
                    .ollama()
                    .model(&config.model)
                    .base_url(&base_url)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| Self::build_error("Ollama", e))?;

                Ok(Box::new(client))
            }
            "groq" => {
                let api_key = Self::require_api_key(config)?;

                let mut builder = LlmBuilder::new()
                    .groq()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| Self::build_error("Groq", e))?;

                Ok(Box::new(client))
            }
            provider => Err(config_error!(
                format!("Unsupported LLM provider: {}", provider),
                "siumai_provider"
            )),
        }
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> ResearchResult<String> {
        let start_time = Instant::now();
        let messages = vec![system!(system_prompt), user!(user_prompt)];

        let response = with_timeout(self.client.chat(messages), self.timeout_ms, "llm_chat")
            .await?
            .map_err(|e| ResearchError::Upstream {
                service: "completion".to_string(),
                message: format!("LLM generation failed: {}", e),
                status: None,
                raw: None,
                source: None,
                context: ErrorContext::new("siumai_provider")
                    .with_operation("chat")
                    .with_metadata("model", &self.model),
            })?;

        let content = response.content_text().ok_or_else(|| ResearchError::Upstream {
            service: "completion".to_string(),
            message: "No text content in LLM response".to_string(),
            status: None,
            raw: None,
            source: None,
            context: ErrorContext::new("siumai_provider").with_operation("chat"),
        })?;

        debug!(
            "Generated response in {:?} ({} chars)",
            start_time.elapsed(),
            content.len()
        );

        Ok(content.to_string())
    }
}

#[async_trait]
impl CompletionProvider for SiumaiCompletionProvider {
    fn name(&self) -> &str {
        &self.provider
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &StructuredSchema,
    ) -> ResearchResult<serde_json::Value> {
        let system_prompt = system_with_schema(system_prompt, schema);

        let raw = performance::measure_async(schema.name(), async {
            self.generate(&system_prompt, user_prompt).await
        })
        .await?;

        parse_structured(&raw, schema)
    }
}
