//! Research loop
//!
//! One level plans queries, then runs search and extraction for each of them.
//! A failing query is contained: it emits one error event and contributes
//! nothing, while the rest of the level carries on. Levels are composed
//! across depth by [`ResearchLoop::run`], each one seeded with the learnings
//! found so far and the follow-up questions of the level before it.

use crate::api::{SearchOptions, UsageTracker, WebSearch};
use crate::extractor::ResultExtractor;
use crate::planner::QueryPlanner;
use crate::progress::ProgressSink;
use crate::prompts::deeper_level_topic;
use deepresearch_core::{
    process_in_order, ErrorContext, ProgressKind, ResearchConfig, ResearchError, ResearchQuery,
    ResearchResult, ResearchState,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Knobs of the loop that do not change between levels
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub search: SearchOptions,
    pub concurrency: usize,
    pub max_total_queries: usize,
    pub query_source: String,
}

impl Default for LoopOptions {
    fn default() -> Self {
        let research = ResearchConfig::default();
        Self {
            search: SearchOptions::default(),
            concurrency: research.concurrency,
            max_total_queries: research.max_total_queries,
            query_source: "deep research".to_string(),
        }
    }
}

/// Result of one breadth level, before deduplication
#[derive(Debug, Clone, Default)]
pub struct LevelOutcome {
    pub state: ResearchState,
    pub follow_up_questions: Vec<String>,
    pub queries_issued: usize,
}

#[derive(Debug, Default)]
struct QueryContribution {
    state: ResearchState,
    follow_up_questions: Vec<String>,
}

pub struct ResearchLoop {
    planner: QueryPlanner,
    extractor: ResultExtractor,
    search: Arc<dyn WebSearch>,
    usage: Arc<dyn UsageTracker>,
    options: LoopOptions,
}

impl ResearchLoop {
    pub fn new(
        planner: QueryPlanner,
        extractor: ResultExtractor,
        search: Arc<dyn WebSearch>,
        usage: Arc<dyn UsageTracker>,
        options: LoopOptions,
    ) -> Self {
        Self {
            planner,
            extractor,
            search,
            usage,
            options,
        }
    }

    pub fn options(&self) -> &LoopOptions {
        &self.options
    }

    /// Run `depth` levels of research and return the deduplicated state.
    ///
    /// At most `max_total_queries` queries are issued across all levels. The
    /// run stops early when a level plans no queries.
    pub async fn run(
        &self,
        topic: &str,
        breadth: usize,
        depth: usize,
        prior: ResearchState,
        account_token: Option<&str>,
        progress: &ProgressSink,
    ) -> ResearchResult<ResearchState> {
        let mut state = prior;
        let mut directions: Vec<String> = Vec::new();
        let mut queries_used = 0;
        // Budget capping narrows a level, not what each query is asked for
        let per_query_limit = ResearchConfig::per_query_limit(breadth);

        for level in 1..=depth {
            ensure_not_cancelled(progress)?;

            let remaining = self.options.max_total_queries.saturating_sub(queries_used);
            if remaining == 0 {
                info!("Query budget exhausted after {} queries", queries_used);
                break;
            }

            let level_breadth = breadth.min(remaining);
            let level_topic = deeper_level_topic(topic, &directions);
            let learnings_so_far = state.unique_learnings();

            info!(
                "Starting research level {}/{} with breadth {}",
                level, depth, level_breadth
            );

            let outcome = self
                .run_level(
                    &level_topic,
                    level_breadth,
                    per_query_limit,
                    &learnings_so_far,
                    account_token,
                    progress,
                )
                .await?;

            queries_used += outcome.queries_issued;
            state.merge(outcome.state);

            if outcome.queries_issued == 0 {
                info!("Level {} planned no queries, stopping", level);
                break;
            }

            directions = outcome.follow_up_questions;
        }

        Ok(state.into_deduped())
    }

    /// Plan and process one breadth level, asking each query for at most
    /// `per_query_limit` learnings and follow-ups. Planning failures propagate
    /// as run failures; per-query failures are contained.
    pub async fn run_level(
        &self,
        topic: &str,
        breadth: usize,
        per_query_limit: usize,
        prior_learnings: &[String],
        account_token: Option<&str>,
        progress: &ProgressSink,
    ) -> ResearchResult<LevelOutcome> {
        let queries = self
            .planner
            .plan(topic, prior_learnings, breadth, progress)
            .await
            .map_err(|e| e.into_run_failure("planning"))?;

        if queries.is_empty() {
            return Ok(LevelOutcome::default());
        }

        let queries_issued = queries.len();

        let contributions = process_in_order(queries, self.options.concurrency, |query| {
            self.process_query(query, per_query_limit, account_token, progress)
        })
        .await;

        let mut outcome = LevelOutcome {
            queries_issued,
            ..LevelOutcome::default()
        };
        for contribution in contributions {
            let contribution = contribution?;
            outcome.state.merge(contribution.state);
            outcome
                .follow_up_questions
                .extend(contribution.follow_up_questions);
        }

        let mut seen = HashSet::new();
        outcome
            .follow_up_questions
            .retain(|question| seen.insert(question.clone()));

        Ok(outcome)
    }

    /// Run one query, converting any failure into an error event and an empty
    /// contribution. Only cancellation is returned as an error.
    async fn process_query(
        &self,
        query: ResearchQuery,
        per_query_limit: usize,
        account_token: Option<&str>,
        progress: &ProgressSink,
    ) -> ResearchResult<QueryContribution> {
        ensure_not_cancelled(progress)?;

        match self
            .search_and_extract(&query.query, per_query_limit, account_token, progress)
            .await
        {
            Ok(contribution) => Ok(contribution),
            Err(error) => {
                progress.emit(
                    ProgressKind::Error,
                    format!("Error running \"{}\": {}", query.query, error),
                );
                error.into_query_failure(&query.query).log();
                Ok(QueryContribution::default())
            }
        }
    }

    async fn search_and_extract(
        &self,
        query: &str,
        per_query_limit: usize,
        account_token: Option<&str>,
        progress: &ProgressSink,
    ) -> ResearchResult<QueryContribution> {
        progress.emit(ProgressKind::Research, format!("Researching\n{}", query));

        let documents = self.search.search(query, &self.options.search).await?;

        if let Some(token) = account_token {
            if let Err(e) = self.usage.track(token, &self.options.query_source).await {
                warn!(query, error = %e, "Usage tracking failed, continuing");
            }
        }

        progress.emit(
            ProgressKind::Research,
            format!("Found {} results\n{}", documents.len(), query),
        );

        if documents.is_empty() {
            return Ok(QueryContribution::default());
        }

        let extraction = self
            .extractor
            .extract(query, &documents, per_query_limit, per_query_limit, progress)
            .await?;

        Ok(QueryContribution {
            state: ResearchState::with_prior(
                extraction.learnings,
                documents.into_iter().filter_map(|doc| doc.url).collect(),
            ),
            follow_up_questions: extraction.follow_up_questions,
        })
    }
}

pub(crate) fn ensure_not_cancelled(progress: &ProgressSink) -> ResearchResult<()> {
    if progress.is_cancelled() {
        return Err(ResearchError::Cancelled {
            reason: "progress stream closed by consumer".to_string(),
            context: ErrorContext::new("research_loop").with_operation("check_cancelled"),
        });
    }
    Ok(())
}
