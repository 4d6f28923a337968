//! Shared HTTP plumbing for providers and collaborator clients

use deepresearch_core::{ErrorContext, ResearchError, ResearchResult};
use std::time::Duration;

pub const USER_AGENT: &str = "deepresearch/0.1";

/// Build a reqwest client with a request timeout and the workspace user agent
pub fn create_http_client(timeout: Duration) -> ResearchResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(USER_AGENT),
    );

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| ResearchError::Config {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("http_client").with_operation("create_client"),
        })
}

/// Map a transport failure onto an upstream error for `service`
pub fn transport_error(service: &str, operation: &str, error: reqwest::Error) -> ResearchError {
    let status = error.status().map(|s| s.as_u16());
    ResearchError::Upstream {
        service: service.to_string(),
        message: format!("Request failed: {}", error),
        status,
        raw: None,
        source: Some(Box::new(error)),
        context: ErrorContext::new(service)
            .with_operation(operation)
            .with_suggestion("Check network connectivity and the service base URL"),
    }
}

/// Turn a non-2xx response into an upstream error carrying status and body
pub async fn response_error(
    response: reqwest::Response,
    service: &str,
    operation: &str,
) -> ResearchError {
    let status = response.status();
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();

    ResearchError::Upstream {
        service: service.to_string(),
        message: format!(
            "HTTP {} from {}: {}",
            status.as_u16(),
            url,
            if body.is_empty() {
                status.canonical_reason().unwrap_or("Unknown error")
            } else {
                &body
            }
        ),
        status: Some(status.as_u16()),
        raw: if body.is_empty() { None } else { Some(body.clone()) },
        source: None,
        context: ErrorContext::new(service)
            .with_operation(operation)
            .with_suggestion(match status.as_u16() {
                401 | 403 => "Check the configured API key",
                429 => "Rate limited, retry later",
                _ => "Check network connectivity and service status",
            }),
    }
}
