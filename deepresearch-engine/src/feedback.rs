//! Clarifying questions asked before research starts

use crate::prompts::{feedback_prompt, system_prompt};
use deepresearch_core::ResearchResult;
use deepresearch_llm::{complete_as, CompletionProvider, SchemaField, StructuredSchema};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
struct FeedbackQuestions {
    questions: Vec<String>,
}

fn feedback_schema(count: usize) -> StructuredSchema {
    StructuredSchema::new("feedback_questions").field(SchemaField::string_list(
        "questions",
        format!(
            "Follow up questions to clarify the research direction, max of {}",
            count
        ),
    ))
}

pub struct FeedbackPlanner {
    provider: Arc<dyn CompletionProvider>,
}

impl FeedbackPlanner {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Ask for at most `count` distinct clarifying questions about `topic`
    pub async fn plan(&self, topic: &str, count: usize) -> ResearchResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let response: FeedbackQuestions = complete_as(
            self.provider.as_ref(),
            &system_prompt(),
            &feedback_prompt(topic, count),
            &feedback_schema(count),
        )
        .await?;

        let mut seen = HashSet::new();
        let questions: Vec<String> = response
            .questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty() && seen.insert(q.clone()))
            .take(count)
            .collect();

        info!("Generated {} feedback questions", questions.len());
        Ok(questions)
    }
}
