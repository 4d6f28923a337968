//! Integration tests for structured completion parsing

use async_trait::async_trait;
use deepresearch_core::{ResearchError, ResearchResult};
use deepresearch_llm::{
    complete_as, parse_structured, system_with_schema, CompletionProvider, SchemaField,
    StructuredSchema,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Mutex;
use tokio_test::assert_err;

/// Provider that replays canned raw text through the real parser
struct CannedProvider {
    raw: String,
    seen_system: Mutex<Option<String>>,
}

impl CannedProvider {
    fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            seen_system: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CompletionProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        _user_prompt: &str,
        schema: &StructuredSchema,
    ) -> ResearchResult<Value> {
        *self.seen_system.lock().unwrap() = Some(system_with_schema(system_prompt, schema));
        parse_structured(&self.raw, schema)
    }
}

fn questions_schema() -> StructuredSchema {
    StructuredSchema::new("feedback_questions")
        .field(SchemaField::string_list("questions", "Follow-up questions"))
}

fn queries_schema() -> StructuredSchema {
    StructuredSchema::new("serp_queries").field(SchemaField::object_list(
        "queries",
        "SERP queries",
        vec![
            SchemaField::string("query", "The SERP query"),
            SchemaField::string("researchGoal", "Goal of the query"),
        ],
    ))
}

fn extraction_schema() -> StructuredSchema {
    StructuredSchema::new("serp_result")
        .field(SchemaField::string_list("learnings", "Learnings"))
        .field(SchemaField::string_list("followUpQuestions", "Follow-up questions"))
}

#[tokio::test]
async fn test_fenced_block_with_surrounding_prose() {
    let raw = "Here is the plan you asked for:\n\n```json\n{\"queries\": [{\"query\": \"fed rate hikes seed funding 2023\", \"researchGoal\": \"Quantify seed impact\"}]}\n```\n\nLet me know if you need more.";
    let provider = CannedProvider::new(raw);

    let value = provider
        .complete("system", "user", &queries_schema())
        .await
        .unwrap();

    assert_eq!(value["queries"][0]["query"], "fed rate hikes seed funding 2023");
    assert_eq!(value["queries"][0]["researchGoal"], "Quantify seed impact");
}

#[tokio::test]
async fn test_untagged_fence_is_accepted() {
    let raw = "Result:\n```\n{\"questions\": [\"Which stage?\"]}\n```";
    let value = parse_structured(raw, &questions_schema()).unwrap();
    assert_eq!(value, json!({"questions": ["Which stage?"]}));
}

#[tokio::test]
async fn test_alias_remapping() {
    let provider = CannedProvider::new(r#"{"follow_up_questions": ["a", "b"]}"#);

    let value = provider
        .complete("system", "user", &questions_schema())
        .await
        .unwrap();

    assert_eq!(value, json!({"questions": ["a", "b"]}));
}

#[tokio::test]
async fn test_report_alias_and_snake_case_goals() {
    let report_schema = StructuredSchema::new("final_report")
        .field(SchemaField::string("reportMarkdown", "Final report"));
    let value = parse_structured(r#"{"report": "body"}"#, &report_schema).unwrap();
    assert_eq!(value, json!({"reportMarkdown": "body"}));

    let value = parse_structured(
        r#"{"serp_queries": [{"search_query": "q", "goal": "g"}]}"#,
        &queries_schema(),
    )
    .unwrap();
    assert_eq!(value, json!({"queries": [{"query": "q", "researchGoal": "g"}]}));
}

#[tokio::test]
async fn test_heuristic_numbered_list() {
    let raw = "1. What time horizon matters to you?\n2. Are you focused on US startups?\n3. Which funding stages?";
    let provider = CannedProvider::new(raw);

    let value = provider
        .complete("system", "user", &questions_schema())
        .await
        .unwrap();

    assert_eq!(
        value["questions"],
        json!([
            "What time horizon matters to you?",
            "Are you focused on US startups?",
            "Which funding stages?"
        ])
    );
}

#[tokio::test]
async fn test_heuristic_list_cannot_satisfy_multi_field_schema() {
    let raw = "1. Rates rose\n2. Funding fell";
    match parse_structured(raw, &extraction_schema()).unwrap_err() {
        ResearchError::SchemaViolation { schema, message, .. } => {
            assert_eq!(schema, "serp_result");
            assert!(message.contains("followUpQuestions"));
        }
        other => panic!("Expected SchemaViolation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_valid_json_with_wrong_shape_is_a_schema_violation() {
    let error = assert_err!(parse_structured(
        r#"{"queries": [{"query": 42}]}"#,
        &queries_schema()
    ));
    assert!(matches!(error, ResearchError::SchemaViolation { .. }));
    assert!(!error.is_recoverable());
}

#[tokio::test]
async fn test_unparseable_output_carries_raw_content() {
    let raw = "I'm sorry, I cannot help with that.";
    match parse_structured(raw, &queries_schema()).unwrap_err() {
        ResearchError::Upstream { raw: Some(body), .. } => assert_eq!(body, raw),
        other => panic!("Expected Upstream with raw content, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_output_is_not_an_empty_list() {
    let error = assert_err!(parse_structured("   \n", &questions_schema()));
    assert!(matches!(error, ResearchError::Upstream { .. }));
}

#[tokio::test]
async fn test_complete_as_deserializes_and_frames_system_prompt() {
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Extraction {
        learnings: Vec<String>,
        follow_up_questions: Vec<String>,
    }

    let provider = CannedProvider::new(
        r#"{"key_learnings": ["Seed rounds fell 30% in 2023"], "followUpQuestions": ["Why?"]}"#,
    );

    let extraction: Extraction = complete_as(
        &provider,
        "You are an expert researcher.",
        "Extract learnings",
        &extraction_schema(),
    )
    .await
    .unwrap();

    assert_eq!(extraction.learnings, vec!["Seed rounds fell 30% in 2023"]);
    assert_eq!(extraction.follow_up_questions, vec!["Why?"]);

    let system = provider.seen_system.lock().unwrap().clone().unwrap();
    assert!(system.starts_with("You are an expert researcher."));
    assert!(system.contains("\"followUpQuestions\" (array of strings)"));
}
