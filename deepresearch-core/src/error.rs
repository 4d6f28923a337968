//! Error taxonomy
//!
//! Schema violations, upstream failures, contained query failures and run
//! failures are the four outcomes the research loop distinguishes; the rest
//! cover configuration, validation, timeouts, cancellation and I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub type ResearchResult<T> = Result<T, ResearchError>;

/// Where and why an error happened, with hints for the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub error_id: String,
    pub timestamp: DateTime<Utc>,
    pub component: String,
    pub operation: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            error_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.into(),
            operation: None,
            metadata: BTreeMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.metadata.insert(key.into(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.recovery_suggestions.push(suggestion.into());
        self
    }

    /// `component.operation`, or just the component
    pub fn location(&self) -> String {
        match &self.operation {
            Some(operation) => format!("{}.{}", self.component, operation),
            None => self.component.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ResearchError {
    /// A completion response was parsed but does not match the declared schema
    #[error("Schema violation in '{schema}': {message}")]
    SchemaViolation {
        schema: String,
        message: String,
        context: ErrorContext,
    },

    /// Transport failure or non-2xx response from a collaborator service
    #[error("Upstream error from {service}: {message}")]
    Upstream {
        service: String,
        message: String,
        status: Option<u16>,
        /// Raw response body, kept for diagnostics
        raw: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    /// A single planned query's search-or-extract pipeline failed
    #[error("Query '{query}' failed: {message}")]
    QueryFailure {
        query: String,
        message: String,
        #[source]
        source: Option<Box<ResearchError>>,
        context: ErrorContext,
    },

    /// The whole run is meaningless (planning or synthesis failed)
    #[error("Research run failed: {message}")]
    RunFailure {
        message: String,
        #[source]
        source: Option<Box<ResearchError>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("Research cancelled: {reason}")]
    Cancelled {
        reason: String,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl ResearchError {
    pub fn context(&self) -> Option<&ErrorContext> {
        use ResearchError::*;
        match self {
            SchemaViolation { context, .. }
            | Upstream { context, .. }
            | QueryFailure { context, .. }
            | RunFailure { context, .. }
            | Config { context, .. }
            | Validation { context, .. }
            | Timeout { context, .. }
            | Cancelled { context, .. }
            | Internal { context, .. } => Some(context),
            Io(_) | Serialization(_) => None,
        }
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ResearchError::SchemaViolation { .. } => "schema_violation",
            ResearchError::Upstream { .. } => "upstream",
            ResearchError::QueryFailure { .. } => "query_failure",
            ResearchError::RunFailure { .. } => "run_failure",
            ResearchError::Config { .. } => "config",
            ResearchError::Validation { .. } => "validation",
            ResearchError::Timeout { .. } => "timeout",
            ResearchError::Cancelled { .. } => "cancelled",
            ResearchError::Io(_) => "io",
            ResearchError::Serialization(_) => "serialization",
            ResearchError::Internal { .. } => "internal",
        }
    }

    /// Whether retrying the same call may succeed. Client errors are final,
    /// except 429.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ResearchError::Upstream {
                status: Some(status),
                ..
            } => *status == 429 || !(400..500).contains(status),
            ResearchError::Upstream { status: None, .. } => true,
            ResearchError::Timeout { .. } | ResearchError::QueryFailure { .. } => true,
            _ => false,
        }
    }

    /// Suggested pause before a retry
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ResearchError::Upstream { status: Some(429), .. } => Some(2000),
            ResearchError::Upstream { .. } if self.is_recoverable() => Some(1000),
            ResearchError::Timeout { .. } => Some(2000),
            _ => None,
        }
    }

    /// HTTP status reported by a collaborator, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ResearchError::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    /// Wrap this error as the contained failure of a single query
    pub fn into_query_failure(self, query: &str) -> ResearchError {
        ResearchError::QueryFailure {
            query: query.to_string(),
            message: self.to_string(),
            context: ErrorContext::new("research_loop")
                .with_operation("process_query")
                .with_metadata("query", query),
            source: Some(Box::new(self)),
        }
    }

    /// Wrap this error as a run-level failure. Run failures and cancellations
    /// pass through unchanged.
    pub fn into_run_failure(self, stage: &str) -> ResearchError {
        if matches!(
            self,
            ResearchError::RunFailure { .. } | ResearchError::Cancelled { .. }
        ) {
            return self;
        }

        ResearchError::RunFailure {
            message: format!("{} failed: {}", stage, self),
            context: ErrorContext::new("research_service").with_operation(stage),
            source: Some(Box::new(self)),
        }
    }

    /// Log once: contained and retryable failures as warnings, cancellation
    /// as info, everything else as an error
    pub fn log(&self) {
        let error_id = self.context().map(|c| c.error_id.as_str()).unwrap_or("-");
        let location = self
            .context()
            .map(ErrorContext::location)
            .unwrap_or_default();
        let kind = self.kind();

        match self {
            ResearchError::Cancelled { .. } => {
                info!(error_id, kind, location = %location, error = %self, "research stopped");
            }
            ResearchError::Upstream { .. }
            | ResearchError::Timeout { .. }
            | ResearchError::QueryFailure { .. } => {
                warn!(error_id, kind, location = %location, error = %self, "recoverable failure");
            }
            _ => {
                error!(error_id, kind, location = %location, error = %self, "failure");
            }
        }
    }
}

/// `SchemaViolation` for a named schema
#[macro_export]
macro_rules! schema_violation {
    ($schema:expr, $msg:expr) => {
        $crate::ResearchError::SchemaViolation {
            schema: $schema.to_string(),
            message: $msg.to_string(),
            context: $crate::ErrorContext::new("structured_completion")
                .with_operation("validate"),
        }
    };
}

#[macro_export]
macro_rules! upstream_error {
    ($service:expr, $msg:expr) => {
        $crate::ResearchError::Upstream {
            service: $service.to_string(),
            message: $msg.to_string(),
            status: None,
            raw: None,
            source: None,
            context: $crate::ErrorContext::new($service),
        }
    };
    ($service:expr, $msg:expr, $source:expr) => {
        $crate::ResearchError::Upstream {
            service: $service.to_string(),
            message: $msg.to_string(),
            status: None,
            raw: None,
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($service),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::ResearchError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'deepresearch config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::ResearchError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}
