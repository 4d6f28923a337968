//! Clients for the external services a research run talks to
//!
//! Each collaborator is a trait so the research loop can run against
//! in-memory doubles; the HTTP implementations live in the submodules.

use async_trait::async_trait;
use deepresearch_core::{ResearchResult, SearchConfig, SearchDocument};
use tracing::debug;

pub mod firecrawl;
pub mod usage;

pub use firecrawl::FirecrawlSearch;
pub use usage::HttpUsageTracker;

/// Per-search limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// The search must fail rather than hang past this
    pub timeout_ms: u64,
    pub result_limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            result_limit: 5,
        }
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            result_limit: config.result_limit,
        }
    }
}

/// Web search collaborator: query in, ranked documents out
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// May return zero documents; at most `options.result_limit`
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> ResearchResult<Vec<SearchDocument>>;
}

/// Metering notification sent once per issued search
#[async_trait]
pub trait UsageTracker: Send + Sync {
    async fn track(&self, account_token: &str, query_source: &str) -> ResearchResult<()>;
}

/// Tracker used when metering is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageTracker;

#[async_trait]
impl UsageTracker for NoopUsageTracker {
    async fn track(&self, _account_token: &str, query_source: &str) -> ResearchResult<()> {
        debug!(query_source, "Usage tracking disabled, skipping");
        Ok(())
    }
}
