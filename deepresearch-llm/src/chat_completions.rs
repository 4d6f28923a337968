//! OpenAI-compatible chat completions endpoint over plain HTTP
//!
//! Used for metered proxies that speak the `/chat/completions` wire format
//! but are not one of the providers siumai knows about.

use crate::http::{create_http_client, response_error, transport_error};
use crate::normalize::{normalize_value, parse_structured};
use crate::provider::{system_with_schema, CompletionProvider};
use crate::schema::StructuredSchema;
use async_trait::async_trait;
use deepresearch_core::{config_error, ErrorContext, LlmConfig, ResearchError, ResearchResult};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const SERVICE: &str = "chat_completions";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl ChatCompletionsProvider {
    pub fn new(config: &LlmConfig) -> ResearchResult<Self> {
        let base_url = config.base_url.as_deref().ok_or_else(|| {
            config_error!(
                "llm.base_url is required for the chat-completions provider",
                "chat_completions"
            )
        })?;

        let client = create_http_client(Duration::from_secs(config.timeout_seconds))?;
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        info!("Created chat completions client for {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, system_prompt: &str, user_prompt: &str) -> ResearchResult<Value> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Posting chat completion to: {}", self.endpoint);

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, "chat", e))?;

        if !response.status().is_success() {
            return Err(response_error(response, SERVICE, "chat").await);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| transport_error(SERVICE, "decode_response", e))
    }
}

/// Pull the message content out of a chat completions response body.
///
/// The content is usually a string, but some proxies return an already
/// structured object or an array of text parts.
fn message_content(body: &Value) -> Option<Value> {
    let content = body
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?;

    match content {
        Value::Array(parts) if parts.iter().all(|p| p.get("text").is_some()) => {
            let text: String = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            Some(Value::String(text))
        }
        Value::Null => None,
        other => Some(other.clone()),
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &StructuredSchema,
    ) -> ResearchResult<Value> {
        let system_prompt = system_with_schema(system_prompt, schema);
        let body = self.send(&system_prompt, user_prompt).await?;

        match message_content(&body) {
            Some(Value::String(text)) => parse_structured(&text, schema),
            Some(structured) => normalize_value(structured, schema),
            None => Err(ResearchError::Upstream {
                service: SERVICE.to_string(),
                message: "Response has no choices[0].message.content".to_string(),
                status: None,
                raw: Some(body.to_string()),
                source: None,
                context: ErrorContext::new(SERVICE).with_operation("read_content"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_string_content() {
        let body = json!({"choices": [{"message": {"content": "{\"a\": 1}"}}]});
        assert_eq!(message_content(&body), Some(json!("{\"a\": 1}")));
    }

    #[test]
    fn passes_structured_content_through() {
        let body = json!({"choices": [{"message": {"content": {"questions": ["q"]}}}]});
        assert_eq!(message_content(&body), Some(json!({"questions": ["q"]})));
    }

    #[test]
    fn joins_text_parts() {
        let body = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "{\"questions\":"},
            {"type": "text", "text": " [\"q\"]}"}
        ]}}]});
        assert_eq!(message_content(&body), Some(json!("{\"questions\": [\"q\"]}")));
    }

    #[test]
    fn missing_choices_yield_nothing() {
        assert_eq!(message_content(&json!({"error": "nope"})), None);
        assert_eq!(
            message_content(&json!({"choices": [{"message": {"content": null}}]})),
            None
        );
    }

    #[test]
    fn requires_a_base_url() {
        let config = LlmConfig {
            provider: "chat-completions".to_string(),
            ..LlmConfig::default()
        };
        assert!(ChatCompletionsProvider::new(&config).is_err());

        let config = LlmConfig {
            base_url: Some("https://proxy.example/v1/".to_string()),
            ..config
        };
        let provider = ChatCompletionsProvider::new(&config).unwrap();
        assert_eq!(provider.endpoint(), "https://proxy.example/v1/chat/completions");
    }
}
