//! Firecrawl search client

use async_trait::async_trait;
use deepresearch_core::{performance, with_timeout, ResearchResult, SearchConfig, SearchDocument};
use deepresearch_llm::http::{create_http_client, response_error, transport_error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::{SearchOptions, WebSearch};

const SERVICE: &str = "web_search";

/// Firecrawl `/v1/search` client
pub struct FirecrawlSearch {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
    timeout: u64,
    scrape_options: ScrapeOptions,
}

#[derive(Debug, Serialize)]
struct ScrapeOptions {
    formats: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    url: Option<String>,
    title: Option<String>,
    markdown: Option<String>,
}

impl From<SearchItem> for SearchDocument {
    fn from(item: SearchItem) -> Self {
        Self {
            url: item.url,
            title: item.title,
            markdown_content: item.markdown.filter(|m| !m.trim().is_empty()),
        }
    }
}

impl FirecrawlSearch {
    /// Create a client; the API key is taken from `config` only
    pub fn new(config: &SearchConfig) -> ResearchResult<Self> {
        let client = create_http_client(Duration::from_millis(config.timeout_ms))?;

        info!("Created Firecrawl client for {}", config.base_url);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> ResearchResult<Vec<SearchDocument>> {
        let url = format!("{}/v1/search", self.base_url);
        let request = SearchRequest {
            query,
            limit: options.result_limit,
            timeout: options.timeout_ms,
            scrape_options: ScrapeOptions {
                formats: vec!["markdown"],
            },
        };

        debug!("Making Firecrawl search request to: {}", url);

        let mut builder = self
            .client
            .post(&url)
            .timeout(Duration::from_millis(options.timeout_ms))
            .json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, "search", e))?;

        if !response.status().is_success() {
            return Err(response_error(response, SERVICE, "search").await);
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| transport_error(SERVICE, "decode_response", e))?;

        let mut documents: Vec<SearchDocument> =
            body.data.into_iter().map(SearchDocument::from).collect();
        documents.truncate(options.result_limit);

        Ok(documents)
    }
}

#[async_trait]
impl WebSearch for FirecrawlSearch {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> ResearchResult<Vec<SearchDocument>> {
        performance::measure_async(
            "firecrawl_search",
            with_timeout(
                self.post_search(query, options),
                options.timeout_ms,
                "firecrawl_search",
            ),
        )
        .await?
    }
}
