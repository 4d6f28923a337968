//! Deep Research LLM - structured completions and prompt budgeting
//!
//! Every model call in the workspace goes through [`CompletionProvider`]:
//! the caller declares the JSON shape it expects with a [`StructuredSchema`]
//! and receives a validated value or a typed error.

pub mod budget;
pub mod chat_completions;
pub mod http;
pub mod normalize;
pub mod provider;
pub mod schema;
pub mod siumai_provider;
pub mod splitter;

pub use budget::PromptBudgeter;
pub use chat_completions::ChatCompletionsProvider;
pub use normalize::{normalize_value, parse_structured};
pub use provider::{complete_as, create_provider, system_with_schema, CompletionProvider};
pub use schema::{FieldKind, SchemaField, StructuredSchema};
pub use siumai_provider::SiumaiCompletionProvider;
pub use splitter::RecursiveCharacterSplitter;
