//! Deep Research CLI - command-line interface for the research engine
//!
//! Asks clarifying questions, runs iterative research with live progress and
//! writes the final Markdown report.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use deepresearch_core::{
    default_config_path, init_logging, log_operation_error, log_operation_start,
    log_operation_success, DeepResearchConfig, LogFormat, LoggingConfig,
};
use deepresearch_engine::{DeepResearchService, ResearchRequest, StreamFrame};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "deepresearch")]
#[command(about = "Iterative web research that ends in a Markdown report")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask clarifying questions about a research topic
    Feedback {
        /// Research topic
        query: String,

        /// Maximum number of questions
        #[arg(short = 'n', long, default_value = "3")]
        count: usize,
    },

    /// Run iterative research and write the final report
    Research {
        /// Research topic
        query: String,

        /// Queries per level
        #[arg(short, long)]
        breadth: Option<usize>,

        /// Number of levels
        #[arg(short, long)]
        depth: Option<usize>,

        /// Credit identifier used for usage tracking
        #[arg(long)]
        credit_id: Option<String>,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print raw server-sent event frames
        #[arg(long)]
        sse: bool,
    },

    /// Write a report from learnings gathered earlier
    Report {
        /// Research topic
        query: String,

        /// File with one learning per line
        #[arg(long)]
        learnings: PathBuf,

        /// File with one visited URL per line
        #[arg(long)]
        urls: Option<PathBuf>,

        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        /// Write a default configuration file
        #[arg(long)]
        init: bool,

        /// Show the effective configuration
        #[arg(long)]
        show: bool,

        /// Validate the effective configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {}", e);
        }
    }

    let mut logging_config = LoggingConfig::default();
    if cli.verbose {
        logging_config = logging_config.verbose();
    }
    if cli.json_logs {
        logging_config = logging_config.with_format(LogFormat::Json);
    }
    init_logging(&logging_config).context("Failed to initialize logging")?;

    info!("Starting deepresearch CLI v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Feedback { query, count } => handle_feedback(&query, count, &config).await,
        Commands::Research {
            query,
            breadth,
            depth,
            credit_id,
            output,
            sse,
        } => {
            let mut request = ResearchRequest::new(query);
            request.breadth = breadth;
            request.depth = depth;
            request.account_token = credit_id;
            handle_research(request, output, sse, &config).await
        }
        Commands::Report {
            query,
            learnings,
            urls,
            output,
        } => handle_report(&query, &learnings, urls.as_deref(), output, &config).await,
        Commands::Config {
            init,
            show,
            validate,
        } => handle_config(init, show, validate, cli.config.as_deref(), &config),
    }
}

/// File configuration (explicit path, then the default location) overlaid
/// with environment variables
fn load_config(config_path: Option<&Path>) -> Result<DeepResearchConfig> {
    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            DeepResearchConfig::from_file(path)?
        }
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                info!("Loading configuration from {:?}", default_path);
                DeepResearchConfig::from_file(&default_path)?
            } else {
                debug!("No configuration file found, using defaults");
                DeepResearchConfig::default()
            }
        }
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut DeepResearchConfig, var: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| var(key).filter(|value| !value.trim().is_empty());

    if let Some(key) = var("OPENAI_API_KEY") {
        if config.llm.api_key.is_none() {
            config.llm.api_key = Some(key);
        }
    }
    if let Some(key) = var("FIRECRAWL_KEY") {
        config.search.api_key = Some(key);
    }
    if let Some(url) = var("FIRECRAWL_BASE_URL") {
        config.search.base_url = url;
    }
    if let Some(url) = var("DEEPRESEARCH_API_BASE_URL") {
        // The metered proxy serves both chat completions and usage tracking
        if config.llm.provider == "chat-completions" && config.llm.base_url.is_none() {
            config.llm.base_url = Some(url.clone());
        }
        config.usage.base_url = Some(url);
        config.usage.enabled = true;
    }
}

async fn handle_feedback(query: &str, count: usize, config: &DeepResearchConfig) -> Result<()> {
    let service = DeepResearchService::from_config(config).await?;
    let questions = service.plan_feedback_questions(query, count).await?;

    if questions.is_empty() {
        println!("No clarifying questions, the topic is clear enough.");
    }
    for (i, question) in questions.iter().enumerate() {
        println!("{}. {}", i + 1, question);
    }
    Ok(())
}

async fn handle_research(
    request: ResearchRequest,
    output: Option<PathBuf>,
    sse: bool,
    config: &DeepResearchConfig,
) -> Result<()> {
    log_operation_start!("research", topic = %request.topic);
    let start = std::time::Instant::now();

    let service = DeepResearchService::from_config(config).await?;
    let mut frames = service.run_research(request);

    while let Some(frame) = frames.next().await {
        if sse {
            print!("{}", frame.to_sse());
            continue;
        }

        match frame {
            StreamFrame::Progress { step } => {
                eprintln!("[{}] {}", step.kind, step.content.replace('\n', " | "));
            }
            StreamFrame::Result(outcome) => {
                log_operation_success!("research", duration_ms = start.elapsed().as_millis() as u64);
                eprintln!(
                    "Finished with {} learnings from {} sources",
                    outcome.learnings.len(),
                    outcome.visited_urls.len()
                );
                write_report(&outcome.report, output.as_deref())?;
                return Ok(());
            }
            StreamFrame::Error { message } => {
                log_operation_error!("research", message);
                bail!("Research failed: {}", message);
            }
        }
    }

    Ok(())
}

async fn handle_report(
    query: &str,
    learnings_path: &Path,
    urls_path: Option<&Path>,
    output: Option<PathBuf>,
    config: &DeepResearchConfig,
) -> Result<()> {
    let learnings = read_lines(learnings_path)?;
    let urls = match urls_path {
        Some(path) => read_lines(path)?,
        None => Vec::new(),
    };
    info!(
        "Writing report from {} learnings and {} URLs",
        learnings.len(),
        urls.len()
    );

    let service = DeepResearchService::from_config(config).await?;
    let report = service.synthesize_report(query, &learnings, &urls).await?;
    write_report(&report, output.as_deref())
}

fn handle_config(
    init: bool,
    show: bool,
    validate: bool,
    config_path: Option<&Path>,
    config: &DeepResearchConfig,
) -> Result<()> {
    if init {
        let path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        DeepResearchConfig::default().save_to_file(&path)?;
        println!("Configuration initialized at: {}", path.display());
        println!("Edit the file to add API keys, or set them in the environment.");
    }

    if show {
        let mut redacted = config.clone();
        redact(&mut redacted.llm.api_key);
        redact(&mut redacted.search.api_key);
        let rendered =
            toml::to_string_pretty(&redacted).context("Failed to render configuration")?;
        println!("{}", rendered);
    }

    if validate {
        config.validate()?;
        println!("Configuration is valid");
    }

    Ok(())
}

fn redact(secret: &mut Option<String>) {
    if secret.is_some() {
        *secret = Some("********".to_string());
    }
}

/// Non-blank, trimmed lines of a file
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn write_report(report: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, report)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", report),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_fills_keys_and_endpoints() {
        let mut config = DeepResearchConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("OPENAI_API_KEY", "sk-test"),
                ("FIRECRAWL_KEY", "fc-test"),
                ("FIRECRAWL_BASE_URL", "http://localhost:3002"),
            ]),
        );

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.search.api_key.as_deref(), Some("fc-test"));
        assert_eq!(config.search.base_url, "http://localhost:3002");
        assert!(!config.usage.enabled);
    }

    #[test]
    fn explicit_llm_key_wins_over_env() {
        let mut config = DeepResearchConfig::default();
        config.llm.api_key = Some("from-file".to_string());
        apply_env_overrides(&mut config, env(&[("OPENAI_API_KEY", "from-env")]));
        assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn proxy_base_url_enables_usage_tracking() {
        let mut config = DeepResearchConfig::default();
        config.llm.provider = "chat-completions".to_string();
        apply_env_overrides(
            &mut config,
            env(&[("DEEPRESEARCH_API_BASE_URL", "https://proxy.example/api")]),
        );

        assert!(config.usage.enabled);
        assert_eq!(config.usage.base_url.as_deref(), Some("https://proxy.example/api"));
        assert_eq!(config.llm.base_url.as_deref(), Some("https://proxy.example/api"));
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut config = DeepResearchConfig::default();
        apply_env_overrides(&mut config, env(&[("FIRECRAWL_BASE_URL", "  ")]));
        assert_eq!(config.search.base_url, "https://api.firecrawl.dev");
    }

    #[test]
    fn cli_parses_research_flags() {
        let cli = Cli::parse_from([
            "deepresearch",
            "research",
            "rates and startups",
            "--breadth",
            "4",
            "--depth",
            "1",
            "--credit-id",
            "c-1",
            "--sse",
        ]);

        match cli.command {
            Commands::Research {
                query,
                breadth,
                depth,
                credit_id,
                sse,
                ..
            } => {
                assert_eq!(query, "rates and startups");
                assert_eq!(breadth, Some(4));
                assert_eq!(depth, Some(1));
                assert_eq!(credit_id.as_deref(), Some("c-1"));
                assert!(sse);
            }
            _ => panic!("Expected research command"),
        }
    }
}
