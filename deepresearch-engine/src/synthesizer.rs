//! Final report synthesis

use crate::progress::ProgressSink;
use crate::prompts::{learnings_block, report_prompt, system_prompt};
use deepresearch_core::{ProgressKind, ResearchResult};
use deepresearch_llm::{complete_as, CompletionProvider, PromptBudgeter, SchemaField, StructuredSchema};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub const REPORT_HEADING: &str = "# Research Report";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinalReport {
    report_markdown: String,
}

fn report_schema() -> StructuredSchema {
    StructuredSchema::new("final_report").field(SchemaField::string(
        "reportMarkdown",
        "Final report on the topic in Markdown",
    ))
}

/// Writes the long-form Markdown report from accumulated learnings
pub struct ReportSynthesizer {
    provider: Arc<dyn CompletionProvider>,
    budgeter: Arc<PromptBudgeter>,
    report_token_budget: usize,
}

impl ReportSynthesizer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        budgeter: Arc<PromptBudgeter>,
        report_token_budget: usize,
    ) -> Self {
        Self {
            provider,
            budgeter,
            report_token_budget,
        }
    }

    /// Generate the report body and wrap it with a heading and a Sources section
    /// listing every visited URL, cited or not
    pub async fn synthesize(
        &self,
        topic: &str,
        learnings: &[String],
        visited_urls: &[String],
        progress: &ProgressSink,
    ) -> ResearchResult<String> {
        info!(
            "Writing final report from {} learnings and {} sources",
            learnings.len(),
            visited_urls.len()
        );
        progress.emit(ProgressKind::Report, format!("Writing final report\n{}", topic));

        let block = self
            .budgeter
            .trim(&learnings_block(learnings), self.report_token_budget);
        debug!(
            tokens = self.budgeter.count_tokens(&block),
            "Budgeted learnings for report"
        );

        let report: FinalReport = complete_as(
            self.provider.as_ref(),
            &system_prompt(),
            &report_prompt(topic, &block),
            &report_schema(),
        )
        .await?;

        let document = assemble_report(&report.report_markdown, visited_urls);

        progress.emit(
            ProgressKind::Report,
            format!("Report ready\n{} sources", visited_urls.len()),
        );

        Ok(document)
    }
}

/// `# Research Report`, the body, then a literal `## Sources` list
pub fn assemble_report(body: &str, visited_urls: &[String]) -> String {
    let sources = visited_urls
        .iter()
        .map(|url| format!("- {}", url))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\n{}\n\n## Sources\n\n{}",
        REPORT_HEADING,
        body.trim(),
        sources
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_has_heading_and_every_source() {
        let urls = vec!["https://a.example".to_string(), "https://b.example".to_string()];
        let report = assemble_report("## Findings\n\nRates rose.\n", &urls);

        assert!(report.starts_with("# Research Report\n\n## Findings"));
        assert!(report.ends_with("## Sources\n\n- https://a.example\n- https://b.example"));
    }

    #[test]
    fn empty_sources_still_get_a_section() {
        let report = assemble_report("Body", &[]);
        assert!(report.ends_with("## Sources\n\n"));
    }
}
