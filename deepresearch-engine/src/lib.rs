//! Deep research engine
//!
//! This crate drives iterative web research:
//! - Plans SERP queries for a topic and refines them level by level
//! - Searches the web and extracts dense learnings from the results
//! - Contains per-query failures so one bad query never sinks a run
//! - Streams progress to the caller and finishes with a Markdown report

pub mod api;
pub mod extractor;
pub mod feedback;
pub mod planner;
pub mod progress;
pub mod prompts;
pub mod research_loop;
pub mod service;
pub mod synthesizer;

pub use api::{
    FirecrawlSearch, HttpUsageTracker, NoopUsageTracker, SearchOptions, UsageTracker, WebSearch,
};
pub use extractor::{Extraction, ResultExtractor};
pub use feedback::FeedbackPlanner;
pub use planner::QueryPlanner;
pub use progress::{ProgressSink, StreamFrame};
pub use research_loop::{LevelOutcome, LoopOptions, ResearchLoop};
pub use service::{DeepResearchService, ResearchRequest};
pub use synthesizer::ReportSynthesizer;
