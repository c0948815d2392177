//! Answer extraction components.
//!
//! [`ExtractiveReader`] locates answer spans in plain-text documents by
//! sliding a word window and scoring weighted query-term overlap.
//! [`TableReader`] answers over structured table documents, addressing cells
//! through their linearized offsets and aggregating count-style questions.

mod extractive;
mod table;

pub use extractive::ExtractiveReader;
pub use table::TableReader;

/// Common English words carrying no signal for overlap scoring.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "were", "what", "when",
    "where", "which", "who", "why", "with",
];

/// Lowercased query terms with stopwords removed.
fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .filter(|word| !STOPWORDS.contains(&word.as_str()))
        .collect()
}
