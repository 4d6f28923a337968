//! Query planning: topic in, distinct SERP queries out

use crate::progress::ProgressSink;
use crate::prompts::{serp_queries_prompt, system_prompt};
use deepresearch_core::{ProgressKind, ResearchQuery, ResearchResult};
use deepresearch_llm::{complete_as, CompletionProvider, SchemaField, StructuredSchema};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct PlannedQueries {
    queries: Vec<ResearchQuery>,
}

fn queries_schema(max_queries: usize) -> StructuredSchema {
    StructuredSchema::new("serp_queries").field(SchemaField::object_list(
        "queries",
        format!("List of SERP queries, max of {}", max_queries),
        vec![
            SchemaField::string("query", "The SERP query"),
            SchemaField::string(
                "researchGoal",
                "First talk about the goal of the research that this query is meant to accomplish, \
then go deeper into how to advance the research once the results are found, mention additional research directions. \
Be as specific as possible, especially for additional research directions.",
            ),
        ],
    ))
}

/// Turns a topic into a bounded list of distinct search queries
pub struct QueryPlanner {
    provider: Arc<dyn CompletionProvider>,
}

impl QueryPlanner {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Plan at most `max_queries` queries, each with a distinct query string.
    ///
    /// Fewer queries than requested is a normal outcome for narrow topics.
    pub async fn plan(
        &self,
        topic: &str,
        prior_learnings: &[String],
        max_queries: usize,
        progress: &ProgressSink,
    ) -> ResearchResult<Vec<ResearchQuery>> {
        info!(
            "Planning up to {} SERP queries ({} prior learnings)",
            max_queries,
            prior_learnings.len()
        );

        progress.emit(
            ProgressKind::Query,
            format!(
                "Generating up to {} Search Engine Result Page (SERP) queries\n{}",
                max_queries, topic
            ),
        );

        if max_queries == 0 {
            return Ok(Vec::new());
        }

        let planned: PlannedQueries = complete_as(
            self.provider.as_ref(),
            &system_prompt(),
            &serp_queries_prompt(topic, max_queries, prior_learnings),
            &queries_schema(max_queries),
        )
        .await?;

        let queries = distinct_queries(planned.queries, max_queries);
        debug!("Planned {} queries", queries.len());

        progress.emit(
            ProgressKind::Query,
            format!(
                "Created {} SERP queries\n{}",
                queries.len(),
                queries
                    .iter()
                    .map(|q| q.query.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        );

        Ok(queries)
    }
}

/// Drop blank and repeated query strings, then keep the first `max_queries`
fn distinct_queries(queries: Vec<ResearchQuery>, max_queries: usize) -> Vec<ResearchQuery> {
    let mut seen = HashSet::new();
    queries
        .into_iter()
        .map(|mut q| {
            q.query = q.query.trim().to_string();
            q
        })
        .filter(|q| !q.query.is_empty() && seen.insert(q.query.clone()))
        .take(max_queries)
        .collect()
}
