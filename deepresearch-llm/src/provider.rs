//! Completion provider strategy
//!
//! A [`CompletionProvider`] issues exactly one request per call and returns a
//! value that satisfies the declared schema, or fails. Retry policy belongs
//! to the caller.

use crate::chat_completions::ChatCompletionsProvider;
use crate::schema::StructuredSchema;
use crate::siumai_provider::SiumaiCompletionProvider;
use async_trait::async_trait;
use deepresearch_core::{config_error, LlmConfig, ResearchResult};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::info;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short provider label used in logs and error contexts
    fn name(&self) -> &str;

    /// Send one system/user prompt pair and return a schema-satisfying value
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &StructuredSchema,
    ) -> ResearchResult<serde_json::Value>;
}

/// Run a completion and deserialize the validated value into `T`
pub async fn complete_as<T: DeserializeOwned>(
    provider: &dyn CompletionProvider,
    system_prompt: &str,
    user_prompt: &str,
    schema: &StructuredSchema,
) -> ResearchResult<T> {
    let value = provider
        .complete(system_prompt, user_prompt, schema)
        .await?;
    Ok(serde_json::from_value(value)?)
}

/// System prompt followed by the JSON shape instructions of `schema`
pub fn system_with_schema(system_prompt: &str, schema: &StructuredSchema) -> String {
    format!("{}\n\n{}", system_prompt.trim_end(), schema.instructions())
}

/// Build the provider selected by `config.provider`
pub async fn create_provider(config: &LlmConfig) -> ResearchResult<Arc<dyn CompletionProvider>> {
    let provider: Arc<dyn CompletionProvider> = match config.provider.as_str() {
        "chat-completions" => Arc::new(ChatCompletionsProvider::new(config)?),
        "openai" | "anthropic" | "ollama" | "groq" => {
            Arc::new(SiumaiCompletionProvider::new(config).await?)
        }
        other => {
            return Err(config_error!(
                format!("Unsupported LLM provider: {}", other),
                "completion_provider"
            ))
        }
    };

    info!(
        provider = provider.name(),
        model = %config.model,
        "Created completion provider"
    );

    Ok(provider)
}
