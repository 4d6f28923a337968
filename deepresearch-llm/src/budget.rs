//! Prompt budgeting
//!
//! Trims arbitrary text so that its token-encoded length fits a budget.
//! Trimming is purely truncation based: the result is always derived from a
//! prefix of the input, cut at the coarsest boundary that fits.

use crate::splitter::{char_len, RecursiveCharacterSplitter};
use deepresearch_core::{ErrorContext, ResearchError, ResearchResult};
use std::borrow::Cow;
use tiktoken_rs::{get_bpe_from_model, o200k_base, CoreBPE};
use tracing::{debug, warn};

/// Below this many characters the budgeter stops splitting and hard-cuts
pub const MIN_CHUNK_SIZE: usize = 140;

/// Average characters per token used to estimate a target length
pub const CHARS_PER_TOKEN: usize = 3;

/// Token counter and trimmer bound to one tokenizer
pub struct PromptBudgeter {
    encoder: CoreBPE,
    model_name: String,
}

impl std::fmt::Debug for PromptBudgeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptBudgeter")
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl PromptBudgeter {
    /// Create a budgeter using the tokenizer of `model_name`, falling back to o200k_base
    pub fn new(model_name: &str) -> ResearchResult<Self> {
        let encoder = match get_bpe_from_model(model_name) {
            Ok(encoder) => encoder,
            Err(e) => {
                warn!(
                    "No tokenizer for model {} ({}), falling back to o200k_base",
                    model_name, e
                );
                o200k_base().map_err(|e| ResearchError::Config {
                    message: format!("Failed to load o200k_base tokenizer: {}", e),
                    source: None,
                    context: ErrorContext::new("prompt_budgeter").with_operation("new"),
                })?
            }
        };

        Ok(Self {
            encoder,
            model_name: model_name.to_string(),
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Count tokens in a text string
    pub fn count_tokens(&self, text: &str) -> usize {
        self.encoder.encode_with_special_tokens(text).len()
    }

    /// Trim `text` so that it encodes to at most `max_tokens` tokens.
    ///
    /// Text already within budget is returned unchanged. Otherwise the target
    /// length is estimated at [`CHARS_PER_TOKEN`] characters per overflowing
    /// token and the first boundary-respecting chunk of that size is kept. If
    /// splitting fails to shrink the text a hard character cut is used, and
    /// once the target drops below [`MIN_CHUNK_SIZE`] the text is hard-cut
    /// directly. Every pass strictly shortens the text, so this terminates.
    pub fn trim(&self, text: &str, max_tokens: usize) -> String {
        let mut current: Cow<'_, str> = Cow::Borrowed(text);

        loop {
            let length = self.count_tokens(&current);
            if length <= max_tokens {
                return current.into_owned();
            }

            let current_chars = char_len(&current);
            let overflow_tokens = length - max_tokens;
            let chunk_size = current_chars.saturating_sub(overflow_tokens * CHARS_PER_TOKEN);

            if chunk_size < MIN_CHUNK_SIZE {
                return self.hard_truncate(&current, max_tokens);
            }

            let first_chunk = RecursiveCharacterSplitter::new(chunk_size)
                .split_text(&current)
                .into_iter()
                .next()
                .unwrap_or_default();

            debug!(
                tokens = length,
                max_tokens = max_tokens,
                chunk_size = chunk_size,
                "Trimming prompt"
            );

            current = if char_len(&first_chunk) >= current_chars {
                Cow::Owned(take_chars(&current, chunk_size))
            } else {
                Cow::Owned(first_chunk)
            };
        }
    }

    /// Hard-cut to the floor size, then drop trailing characters until within budget
    fn hard_truncate(&self, text: &str, max_tokens: usize) -> String {
        let mut truncated = take_chars(text, MIN_CHUNK_SIZE);
        while !truncated.is_empty() && self.count_tokens(&truncated) > max_tokens {
            truncated.pop();
        }
        truncated
    }
}

fn take_chars(text: &str, count: usize) -> String {
    text.chars().take(count).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budgeter() -> PromptBudgeter {
        PromptBudgeter::new("gpt-4o").unwrap()
    }

    #[test]
    fn text_within_budget_is_unchanged() {
        let budgeter = budgeter();
        let text = "Hello, world! This is a test.";
        assert_eq!(budgeter.trim(text, 1000), text);
        assert_eq!(budgeter.trim("", 0), "");
    }

    #[test]
    fn trimmed_text_fits_the_budget() {
        let budgeter = budgeter();
        let text = "Venture funding for startups declined as interest rates climbed. "
            .repeat(500);

        for max_tokens in [5, 50, 300, 2000] {
            let trimmed = budgeter.trim(&text, max_tokens);
            assert!(
                budgeter.count_tokens(&trimmed) <= max_tokens,
                "budget {} exceeded",
                max_tokens
            );
            assert!(text.starts_with(&trimmed));
        }
    }

    #[test]
    fn trims_at_paragraph_boundaries_when_possible() {
        let budgeter = budgeter();
        let paragraph = "Seed rounds held steady through 2023 while growth rounds shrank. ".repeat(8);
        let text = vec![paragraph.trim_end(); 30].join("\n\n");

        let trimmed = budgeter.trim(&text, 600);
        assert!(budgeter.count_tokens(&trimmed) <= 600);
        assert!(trimmed.ends_with("shrank."));
    }

    #[test]
    fn zero_budget_yields_empty_text() {
        let budgeter = budgeter();
        assert_eq!(budgeter.trim("some words that need tokens", 0), "");
    }

    #[test]
    fn unknown_model_falls_back_to_default_encoding() {
        let budgeter = PromptBudgeter::new("not-a-real-model").unwrap();
        assert!(budgeter.count_tokens("hello world") > 0);
    }

    #[test]
    fn trim_is_deterministic() {
        let budgeter = budgeter();
        let text = "Rates, funding, and valuations. ".repeat(300);
        assert_eq!(budgeter.trim(&text, 120), budgeter.trim(&text, 120));
    }
}
