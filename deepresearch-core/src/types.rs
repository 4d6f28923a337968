//! Core data type definitions

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single search query produced by the query planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchQuery {
    /// The SERP query sent to the web search collaborator
    pub query: String,
    /// What this query is meant to accomplish and where to go next
    pub research_goal: String,
}

/// A document returned by the web search collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    pub url: Option<String>,
    pub title: Option<String>,
    /// Page body converted to markdown, absent when the page could not be scraped
    pub markdown_content: Option<String>,
}

/// Accumulated learnings and visited sources of one research run
///
/// Both lists are append-only while a run is in progress. Duplicates are
/// removed once, by [`ResearchState::dedup`], after every branch has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchState {
    pub learnings: Vec<String>,
    pub visited_urls: Vec<String>,
}

impl ResearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a state with learnings and URLs from earlier research
    pub fn with_prior(learnings: Vec<String>, visited_urls: Vec<String>) -> Self {
        Self {
            learnings,
            visited_urls,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.learnings.is_empty() && self.visited_urls.is_empty()
    }

    /// Union another branch's contribution into this state
    pub fn merge(&mut self, other: ResearchState) {
        self.learnings.extend(other.learnings);
        self.visited_urls.extend(other.visited_urls);
    }

    /// Remove exact duplicates, keeping the first occurrence of each entry
    pub fn dedup(&mut self) {
        dedup_preserving_order(&mut self.learnings);
        dedup_preserving_order(&mut self.visited_urls);
    }

    /// Consume the state and return it without duplicates
    pub fn into_deduped(mut self) -> Self {
        self.dedup();
        self
    }

    /// Distinct learnings in discovery order, without mutating the state
    pub fn unique_learnings(&self) -> Vec<String> {
        let mut learnings = self.learnings.clone();
        dedup_preserving_order(&mut learnings);
        learnings
    }
}

fn dedup_preserving_order(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

/// Phase tag of a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    /// Query planning and feedback questions
    Query,
    /// Per-query search and extraction
    Research,
    /// A contained failure of one query
    Error,
    /// Final report synthesis
    Report,
}

impl std::fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgressKind::Query => write!(f, "query"),
            ProgressKind::Research => write!(f, "research"),
            ProgressKind::Error => write!(f, "error"),
            ProgressKind::Report => write!(f, "report"),
        }
    }
}

/// Point-in-time status update delivered to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub content: String,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

/// Terminal result of a research run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchOutcome {
    pub feedback_questions: Vec<String>,
    pub learnings: Vec<String>,
    pub visited_urls: Vec<String>,
    pub report: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_a_union_and_dedup_happens_once() {
        let learning = "Company X raised $50M in 2023".to_string();

        let mut level = ResearchState::new();
        level.merge(ResearchState::with_prior(
            vec![learning.clone()],
            vec!["https://a.example".to_string()],
        ));
        level.merge(ResearchState::with_prior(
            vec![learning.clone(), "Rates rose in 2022".to_string()],
            vec!["https://a.example".to_string(), "https://b.example".to_string()],
        ));

        assert_eq!(level.learnings.len(), 3);

        let level = level.into_deduped();
        assert_eq!(
            level.learnings,
            vec![learning, "Rates rose in 2022".to_string()]
        );
        assert_eq!(level.visited_urls.len(), 2);
    }

    #[test]
    fn progress_event_serializes_with_type_tag() {
        let event = ProgressEvent::new(ProgressKind::Research, "Researching\nquery");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "research");
        assert_eq!(json["content"], "Researching\nquery");
    }
}
