//! Logging setup
//!
//! Every crate logs through `tracing`; the binary installs one subscriber
//! with [`init_logging`]. `RUST_LOG` takes precedence over the configured level.

use crate::error::{ErrorContext, ResearchError, ResearchResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crates of this workspace, each given its own filter directive
pub const WORKSPACE_CRATES: [&str; 4] = [
    "deepresearch_core",
    "deepresearch_llm",
    "deepresearch_engine",
    "deepresearch_cli",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for third-party crates
    pub level: String,
    /// Level for the workspace crates
    pub workspace_level: String,
    pub format: LogFormat,
    /// Append to this file instead of writing to stderr
    pub file: Option<PathBuf>,
    pub with_location: bool,
    /// Emit a close event with busy/idle timings for every span
    pub span_timings: bool,
    /// Extra `target=level` directives
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            workspace_level: "info".to_string(),
            format: LogFormat::Compact,
            file: None,
            with_location: false,
            span_timings: false,
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Debug output for the workspace crates, with span timings
    pub fn verbose(mut self) -> Self {
        self.workspace_level = "debug".to_string();
        self.span_timings = true;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Directives in the order they are applied: workspace crates, then extras
    pub fn filter_directives(&self) -> Vec<String> {
        WORKSPACE_CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.workspace_level))
            .chain(self.directives.iter().cloned())
            .collect()
    }
}

fn logging_error(
    operation: &str,
    message: String,
    source: Box<dyn std::error::Error + Send + Sync>,
) -> ResearchError {
    ResearchError::Config {
        message,
        source: Some(source),
        context: ErrorContext::new("logging")
            .with_operation(operation)
            .with_suggestion("Check RUST_LOG and the logging directives"),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> ResearchResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let mut filter = EnvFilter::new(&config.level);
            for directive in config.filter_directives() {
                let parsed = directive.parse().map_err(|e| {
                    logging_error(
                        "parse_directive",
                        format!("Invalid log directive '{}'", directive),
                        Box::new(e),
                    )
                })?;
                filter = filter.add_directive(parsed);
            }
            filter
        }
    };

    let writer = match &config.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(file)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let layer = fmt::layer()
        .with_span_events(if config.span_timings {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .with_file(config.with_location)
        .with_line_number(config.with_location)
        .with_writer(writer);

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
    };

    installed.map_err(|e| {
        logging_error(
            "install_subscriber",
            "Failed to install log subscriber".to_string(),
            Box::new(e),
        )
    })
}

pub mod performance {
    use std::future::Future;
    use std::time::Instant;
    use tracing::Instrument;

    /// Run `future` inside a `timed` span and log its wall time at debug level
    pub async fn measure_async<F, T>(operation: &str, future: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let output = future
            .instrument(tracing::debug_span!("timed", operation))
            .await;

        tracing::debug!(
            target: "deepresearch::timing",
            operation,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished"
        );
        output
    }
}

/// `log_operation_start!("research", topic = %topic)`
#[macro_export]
macro_rules! log_operation_start {
    ($operation:expr $(, $($field:tt)+)?) => {
        tracing::info!(operation = $operation $(, $($field)+)?, "operation started")
    };
}

#[macro_export]
macro_rules! log_operation_success {
    ($operation:expr $(, $($field:tt)+)?) => {
        tracing::info!(operation = $operation $(, $($field)+)?, "operation succeeded")
    };
}

/// The error is recorded with its `Display` form
#[macro_export]
macro_rules! log_operation_error {
    ($operation:expr, $error:expr $(, $($field:tt)+)?) => {
        tracing::error!(operation = $operation, error = %$error $(, $($field)+)?, "operation failed")
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_directives_come_first() {
        let mut config = LoggingConfig::default().verbose();
        config.directives.push("reqwest=info".to_string());

        let directives = config.filter_directives();
        assert_eq!(directives.len(), 5);
        assert_eq!(directives[0], "deepresearch_core=debug");
        assert_eq!(directives[4], "reqwest=info");
        assert!(config.span_timings);
    }

    #[test]
    fn config_reads_lowercase_format() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"format": "json", "file": "/tmp/research.log"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "warn");
        assert_eq!(config.file, Some(PathBuf::from("/tmp/research.log")));
    }

    #[test]
    fn measure_async_passes_the_output_through() {
        let value = tokio_test::block_on(performance::measure_async("answer", async { 42 }));
        assert_eq!(value, 42);
    }
}
