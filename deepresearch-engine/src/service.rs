//! Public entry points of the research engine

use crate::api::{
    FirecrawlSearch, HttpUsageTracker, NoopUsageTracker, SearchOptions, UsageTracker, WebSearch,
};
use crate::extractor::ResultExtractor;
use crate::feedback::FeedbackPlanner;
use crate::planner::QueryPlanner;
use crate::progress::{ProgressSink, StreamFrame};
use crate::research_loop::{ensure_not_cancelled, LoopOptions, ResearchLoop};
use crate::synthesizer::ReportSynthesizer;
use deepresearch_core::{
    validation_error, DeepResearchConfig, ProgressKind, ResearchConfig, ResearchOutcome,
    ResearchResult, ResearchState,
};
use deepresearch_llm::{create_provider, CompletionProvider, PromptBudgeter};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// Parameters of one research run; unset breadth and depth fall back to configuration
#[derive(Debug, Clone, Default)]
pub struct ResearchRequest {
    pub topic: String,
    pub breadth: Option<usize>,
    pub depth: Option<usize>,
    /// Credit identifier forwarded to usage tracking
    pub account_token: Option<String>,
    pub prior_learnings: Vec<String>,
    pub prior_urls: Vec<String>,
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Self::default()
        }
    }

    pub fn with_breadth(mut self, breadth: usize) -> Self {
        self.breadth = Some(breadth);
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_account_token(mut self, token: impl Into<String>) -> Self {
        self.account_token = Some(token.into());
        self
    }
}

/// Facade over planning, research and synthesis
#[derive(Clone)]
pub struct DeepResearchService {
    feedback: Arc<FeedbackPlanner>,
    research_loop: Arc<ResearchLoop>,
    synthesizer: Arc<ReportSynthesizer>,
    settings: ResearchConfig,
}

impl DeepResearchService {
    /// Build the service with the HTTP collaborators described by `config`
    pub async fn from_config(config: &DeepResearchConfig) -> ResearchResult<Self> {
        config.validate()?;

        let provider = create_provider(&config.llm).await?;
        let search: Arc<dyn WebSearch> = Arc::new(FirecrawlSearch::new(&config.search)?);
        let usage: Arc<dyn UsageTracker> = if config.usage.enabled {
            Arc::new(HttpUsageTracker::new(&config.usage)?)
        } else {
            Arc::new(NoopUsageTracker)
        };

        Self::with_components(config, provider, search, usage)
    }

    /// Build the service around caller-supplied collaborators
    pub fn with_components(
        config: &DeepResearchConfig,
        provider: Arc<dyn CompletionProvider>,
        search: Arc<dyn WebSearch>,
        usage: Arc<dyn UsageTracker>,
    ) -> ResearchResult<Self> {
        let settings = config.research.clone();
        let budgeter = Arc::new(PromptBudgeter::new(&settings.encoding_model)?);

        let research_loop = ResearchLoop::new(
            QueryPlanner::new(provider.clone()),
            ResultExtractor::new(
                provider.clone(),
                budgeter.clone(),
                settings.document_token_budget,
            ),
            search,
            usage,
            LoopOptions {
                search: SearchOptions::from(&config.search),
                concurrency: settings.concurrency,
                max_total_queries: settings.max_total_queries,
                query_source: config.usage.query_source.clone(),
            },
        );

        info!(
            "Created research service (breadth {}, depth {}, concurrency {})",
            settings.breadth, settings.depth, settings.concurrency
        );

        Ok(Self {
            feedback: Arc::new(FeedbackPlanner::new(provider.clone())),
            research_loop: Arc::new(research_loop),
            synthesizer: Arc::new(ReportSynthesizer::new(
                provider,
                budgeter,
                settings.report_token_budget,
            )),
            settings,
        })
    }

    /// Clarifying questions for `topic`, at most `count`
    pub async fn plan_feedback_questions(
        &self,
        topic: &str,
        count: usize,
    ) -> ResearchResult<Vec<String>> {
        self.feedback.plan(topic, count).await
    }

    /// Start a research run in the background and stream its frames.
    ///
    /// The stream always ends with exactly one result or error frame. Dropping
    /// it aborts the run, including any search or completion call in flight.
    pub fn run_research(&self, request: ResearchRequest) -> BoxStream<'static, StreamFrame> {
        let (progress, rx) = ProgressSink::channel();
        let service = self.clone();

        let task = tokio::spawn(async move {
            let frame = match service.research(request, &progress).await {
                Ok(outcome) => StreamFrame::Result(outcome),
                Err(error) => {
                    error.log();
                    StreamFrame::Error {
                        message: error.to_string(),
                    }
                }
            };

            if !progress.finish(frame) {
                debug!("Research stream closed before the terminal frame");
            }
        });

        ResearchStream {
            frames: frame_stream(rx),
            task: task.abort_handle(),
        }
        .boxed()
    }

    /// Run feedback, research and synthesis to completion, reporting into `progress`
    pub async fn research(
        &self,
        request: ResearchRequest,
        progress: &ProgressSink,
    ) -> ResearchResult<ResearchOutcome> {
        let breadth = request.breadth.unwrap_or(self.settings.breadth);
        let depth = request.depth.unwrap_or(self.settings.depth);
        if breadth == 0 {
            return Err(validation_error!("Breadth must be at least 1", "breadth", "research_service"));
        }
        if depth == 0 {
            return Err(validation_error!("Depth must be at least 1", "depth", "research_service"));
        }

        info!(
            "Starting research run (breadth {}, depth {}): {}",
            breadth, depth, request.topic
        );

        let feedback_questions = self.feedback_for_run(&request.topic, progress).await;

        let state = self
            .research_loop
            .run(
                &request.topic,
                breadth,
                depth,
                ResearchState::with_prior(request.prior_learnings, request.prior_urls),
                request.account_token.as_deref(),
                progress,
            )
            .await?;

        info!(
            "Research completed with {} learnings and {} sources",
            state.learnings.len(),
            state.visited_urls.len()
        );

        ensure_not_cancelled(progress)?;

        let report = self
            .synthesizer
            .synthesize(
                &request.topic,
                &state.learnings,
                &state.visited_urls,
                progress,
            )
            .await
            .map_err(|e| e.into_run_failure("synthesis"))?;

        Ok(ResearchOutcome {
            feedback_questions,
            learnings: state.learnings,
            visited_urls: state.visited_urls,
            report,
        })
    }

    /// Final report for learnings gathered elsewhere
    pub async fn synthesize_report(
        &self,
        topic: &str,
        learnings: &[String],
        visited_urls: &[String],
    ) -> ResearchResult<String> {
        self.synthesizer
            .synthesize(topic, learnings, visited_urls, &ProgressSink::disabled())
            .await
    }

    /// Feedback questions are informational; a failure here does not stop the run
    async fn feedback_for_run(&self, topic: &str, progress: &ProgressSink) -> Vec<String> {
        if self.settings.feedback_questions == 0 {
            return Vec::new();
        }

        match self.feedback.plan(topic, self.settings.feedback_questions).await {
            Ok(questions) => {
                progress.emit(
                    ProgressKind::Query,
                    format!("Generated {} feedback questions", questions.len()),
                );
                questions
            }
            Err(error) => {
                warn!(error = %error, "Feedback question generation failed, continuing");
                Vec::new()
            }
        }
    }
}

/// Frames of one run; the run's task dies with the stream
struct ResearchStream {
    frames: BoxStream<'static, StreamFrame>,
    task: AbortHandle,
}

impl Stream for ResearchStream {
    type Item = StreamFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamFrame>> {
        self.frames.poll_next_unpin(cx)
    }
}

impl Drop for ResearchStream {
    fn drop(&mut self) {
        // No-op once the run has finished
        self.task.abort();
    }
}

/// Receiver as a stream that is guaranteed to end on a terminal frame
fn frame_stream(rx: mpsc::UnboundedReceiver<StreamFrame>) -> BoxStream<'static, StreamFrame> {
    stream::unfold((rx, false), |(mut rx, finished)| async move {
        if finished {
            return None;
        }

        match rx.recv().await {
            Some(frame) => {
                let terminal = frame.is_terminal();
                Some((frame, (rx, terminal)))
            }
            None => Some((
                StreamFrame::Error {
                    message: "Research task ended without a result".to_string(),
                },
                (rx, true),
            )),
        }
    })
    .boxed()
}
