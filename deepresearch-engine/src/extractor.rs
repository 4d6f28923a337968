//! Result extraction: search documents in, learnings and follow-up questions out

use crate::progress::ProgressSink;
use crate::prompts::{extraction_prompt, system_prompt};
use deepresearch_core::{ProgressKind, ResearchResult, SearchDocument};
use deepresearch_llm::{complete_as, CompletionProvider, PromptBudgeter, SchemaField, StructuredSchema};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Learnings and follow-up questions extracted for one query
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub learnings: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

fn extraction_schema(max_learnings: usize, max_followups: usize) -> StructuredSchema {
    StructuredSchema::new("serp_result")
        .field(SchemaField::string_list(
            "learnings",
            format!("List of learnings, max of {}", max_learnings),
        ))
        .field(SchemaField::string_list(
            "followUpQuestions",
            format!(
                "List of follow-up questions to research the topic further, max of {}",
                max_followups
            ),
        ))
}

pub struct ResultExtractor {
    provider: Arc<dyn CompletionProvider>,
    budgeter: Arc<PromptBudgeter>,
    document_token_budget: usize,
}

impl ResultExtractor {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        budgeter: Arc<PromptBudgeter>,
        document_token_budget: usize,
    ) -> Self {
        Self {
            provider,
            budgeter,
            document_token_budget,
        }
    }

    /// Extract at most `max_learnings` learnings and `max_followups` questions,
    /// each list free of repeats
    pub async fn extract(
        &self,
        query: &str,
        documents: &[SearchDocument],
        max_learnings: usize,
        max_followups: usize,
        progress: &ProgressSink,
    ) -> ResearchResult<Extraction> {
        let contents: Vec<String> = documents
            .iter()
            .filter_map(|doc| doc.markdown_content.as_deref())
            .map(|content| self.budgeter.trim(content, self.document_token_budget))
            .collect();

        progress.emit(
            ProgressKind::Research,
            format!("Ran \"{}\"\n{} content items found", query, contents.len()),
        );

        if contents.is_empty() {
            debug!("No readable content for query: {}", query);
            progress.emit(
                ProgressKind::Research,
                format!("Generated 0 learnings\n{}", query),
            );
            return Ok(Extraction::default());
        }

        let extraction: Extraction = complete_as(
            self.provider.as_ref(),
            &system_prompt(),
            &extraction_prompt(query, &contents, max_learnings),
            &extraction_schema(max_learnings, max_followups),
        )
        .await?;

        let extraction = Extraction {
            learnings: distinct_bounded(extraction.learnings, max_learnings),
            follow_up_questions: distinct_bounded(extraction.follow_up_questions, max_followups),
        };

        progress.emit(
            ProgressKind::Research,
            format!("Generated {} learnings\n{}", extraction.learnings.len(), query),
        );

        Ok(extraction)
    }
}

fn distinct_bounded(items: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_are_distinct_and_bounded() {
        let items = vec![
            "Rates rose".to_string(),
            "Rates rose ".to_string(),
            "Funding fell".to_string(),
            "Seed held".to_string(),
        ];
        assert_eq!(
            distinct_bounded(items, 2),
            vec!["Rates rose".to_string(), "Funding fell".to_string()]
        );
    }
}
