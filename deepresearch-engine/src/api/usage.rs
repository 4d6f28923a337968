//! Usage tracking client for metered web retrievals

use async_trait::async_trait;
use deepresearch_core::{
    config_error, retry_async_when, ResearchError, ResearchResult, RetryConfig, UsageConfig,
};
use deepresearch_llm::http::{create_http_client, response_error, transport_error};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use super::UsageTracker;

const SERVICE: &str = "usage_tracker";

#[derive(Debug, Serialize)]
struct WebRetrievalRequest<'a> {
    credit_id: &'a str,
    query_source: &'a str,
}

/// Posts one `/web-retrieval` notification per search, retrying transient failures
pub struct HttpUsageTracker {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryConfig,
}

impl HttpUsageTracker {
    pub fn new(config: &UsageConfig) -> ResearchResult<Self> {
        let base_url = config.base_url.as_deref().ok_or_else(|| {
            config_error!("usage.base_url is required for usage tracking", SERVICE)
        })?;

        let client = create_http_client(Duration::from_secs(config.timeout_seconds))?;
        let endpoint = format!("{}/web-retrieval", base_url.trim_end_matches('/'));

        info!("Created usage tracker for {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            retry: config.retry.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_once(&self, account_token: &str, query_source: &str) -> ResearchResult<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&WebRetrievalRequest {
                credit_id: account_token,
                query_source,
            })
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, "track", e))?;

        if !response.status().is_success() {
            return Err(response_error(response, SERVICE, "track").await);
        }

        debug!("Tracked web retrieval");
        Ok(())
    }
}

#[async_trait]
impl UsageTracker for HttpUsageTracker {
    async fn track(&self, account_token: &str, query_source: &str) -> ResearchResult<()> {
        retry_async_when(
            || self.post_once(account_token, query_source),
            &self.retry,
            "track_web_retrieval",
            ResearchError::is_recoverable,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_a_base_url() {
        assert!(HttpUsageTracker::new(&UsageConfig::default()).is_err());

        let config = UsageConfig {
            enabled: true,
            base_url: Some("https://api.example/".to_string()),
            ..UsageConfig::default()
        };
        let tracker = HttpUsageTracker::new(&config).unwrap();
        assert_eq!(tracker.endpoint(), "https://api.example/web-retrieval");
    }

    #[test]
    fn request_body_uses_snake_case() {
        let body = serde_json::to_value(WebRetrievalRequest {
            credit_id: "credit-1",
            query_source: "deep research",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"credit_id": "credit-1", "query_source": "deep research"})
        );
    }
}
