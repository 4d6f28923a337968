//! Recursive character text splitter
//!
//! Splits text into chunks of at most `chunk_size` characters, preferring
//! paragraph boundaries, then lines, sentences, clauses, tags and words, and
//! only falling back to single characters when nothing else fits.

/// Separators tried in order, coarsest first. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 8] = ["\n\n", "\n", ".", ",", ">", "<", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into boundary-respecting chunks, in document order
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let separator = self.pick_separator(text);
        let splits = split_on(text, &separator);

        let mut final_chunks = Vec::new();
        let mut good_splits: Vec<&str> = Vec::new();

        for split in splits {
            if char_len(split) < self.chunk_size {
                good_splits.push(split);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits, &separator));
                good_splits.clear();
            }

            if separator.is_empty() {
                // A single character that does not fit on its own
                final_chunks.push(split.to_string());
            } else {
                final_chunks.extend(self.split_text(split));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits, &separator));
        }

        final_chunks
    }

    fn pick_separator(&self, text: &str) -> String {
        self.separators
            .iter()
            .find(|s| s.is_empty() || text.contains(s.as_str()))
            .cloned()
            .unwrap_or_default()
    }

    /// Greedily pack splits into chunks no longer than `chunk_size`
    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0;

        for split in splits {
            let len = char_len(split);
            let joined_len = if current.is_empty() {
                len
            } else {
                total + separator_len + len
            };

            if joined_len > self.chunk_size && !current.is_empty() {
                if let Some(doc) = join_docs(&current, separator) {
                    docs.push(doc);
                }
                current.clear();
                total = 0;
            }

            total = if current.is_empty() {
                len
            } else {
                total + separator_len + len
            };
            current.push(split);
        }

        if let Some(doc) = join_docs(&current, separator) {
            docs.push(doc);
        }

        docs
    }
}

fn split_on<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).collect()
    }
}

fn join_docs(docs: &[&str], separator: &str) -> Option<String> {
    let text = docs.join(separator);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}
