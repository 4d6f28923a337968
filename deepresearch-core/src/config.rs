//! Configuration management

use crate::async_utils::RetryConfig;
use crate::error::{ErrorContext, ResearchError, ResearchResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration of the deep research workspace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepResearchConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub usage: UsageConfig,
    pub research: ResearchConfig,
}

/// Completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// openai, anthropic, ollama, groq, or chat-completions for any OpenAI-compatible endpoint
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "o3-mini".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: None,
            timeout_seconds: 300,
        }
    }
}

/// Web search collaborator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Per-search timeout; the search must fail rather than hang past it
    pub timeout_ms: u64,
    /// Maximum number of documents per search
    pub result_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.firecrawl.dev".to_string(),
            api_key: None,
            timeout_ms: 15_000,
            result_limit: 5,
        }
    }
}

/// Usage tracking notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    pub enabled: bool,
    pub base_url: Option<String>,
    pub query_source: String,
    pub timeout_seconds: u64,
    pub retry: RetryConfig,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            query_source: "deep research".to_string(),
            timeout_seconds: 10,
            retry: RetryConfig::default(),
        }
    }
}

/// Research loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Queries planned per level
    pub breadth: usize,
    /// Number of levels
    pub depth: usize,
    /// Hard cap on queries issued across all levels of one run
    pub max_total_queries: usize,
    /// Queries of one level processed at the same time
    pub concurrency: usize,
    /// Clarifying questions generated before research starts, 0 disables
    pub feedback_questions: usize,
    /// Token ceiling applied to each search document
    pub document_token_budget: usize,
    /// Token ceiling applied to the learnings given to the report writer
    pub report_token_budget: usize,
    /// Model whose tokenizer is used for budgeting
    pub encoding_model: String,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            breadth: 3,
            depth: 2,
            max_total_queries: 12,
            concurrency: 1,
            feedback_questions: 3,
            document_token_budget: 25_000,
            report_token_budget: 150_000,
            encoding_model: "gpt-4o".to_string(),
        }
    }
}

impl ResearchConfig {
    /// Learnings and follow-up questions requested per query
    pub fn per_query_limit(breadth: usize) -> usize {
        breadth.div_ceil(2).max(1)
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deepresearch")
        .join("config.toml")
}

impl DeepResearchConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ResearchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ResearchError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: DeepResearchConfig =
            toml::from_str(&content).map_err(|e| ResearchError::Config {
                message: format!("Failed to parse config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("parse_toml")
                    .with_suggestion("Check TOML syntax in config file"),
            })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ResearchResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ResearchError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| ResearchError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> ResearchResult<()> {
        let research = &self.research;

        let checks: [(bool, &str, &str); 8] = [
            (research.breadth == 0, "research.breadth", "Breadth must be at least 1"),
            (research.depth == 0, "research.depth", "Depth must be at least 1"),
            (
                research.max_total_queries == 0,
                "research.max_total_queries",
                "max_total_queries must be at least 1",
            ),
            (
                research.concurrency == 0,
                "research.concurrency",
                "Concurrency must be at least 1",
            ),
            (
                research.document_token_budget == 0,
                "research.document_token_budget",
                "Document token budget must be greater than 0",
            ),
            (
                research.report_token_budget == 0,
                "research.report_token_budget",
                "Report token budget must be greater than 0",
            ),
            (
                self.search.timeout_ms == 0,
                "search.timeout_ms",
                "Search timeout must be greater than 0",
            ),
            (
                self.search.result_limit == 0,
                "search.result_limit",
                "Search result limit must be at least 1",
            ),
        ];

        if let Some((_, field, message)) = checks.iter().find(|(failed, _, _)| *failed) {
            return Err(ResearchError::Validation {
                message: message.to_string(),
                field: Some(field.to_string()),
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion(&format!("Set {} to a positive value", field)),
            });
        }

        if self.usage.enabled && self.usage.base_url.is_none() {
            return Err(ResearchError::Validation {
                message: "Usage tracking is enabled but usage.base_url is not set".to_string(),
                field: Some("usage.base_url".to_string()),
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set usage.base_url or disable usage tracking"),
            });
        }

        Ok(())
    }
}
