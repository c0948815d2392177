//! Extractive span reader over plain-text documents.

use std::collections::HashMap;

use futures::future::BoxFuture;
use tracing::{debug, instrument};

use ragline_graph::Component;
use ragline_shared::{
    Answer, Document, FieldSpec, FieldType, InputMap, OutputMap, RaglineError, Result, Value,
};

use crate::query_terms;

/// Default answer window, in words.
const DEFAULT_WINDOW: usize = 15;

/// Extracts scored answer spans from text documents.
///
/// Inputs: `query: Text`, `documents: Documents` (both required). Outputs:
/// `answers: Answers`, best first.
///
/// Scoring slides a word window over each document and measures weighted
/// query-term overlap; rarer terms weigh more. Each document contributes its
/// best span, and the top-k spans across documents become answers carrying
/// char offsets into the source content. Table documents are skipped; they
/// belong to the table reader.
pub struct ExtractiveReader {
    top_k: usize,
    window: usize,
}

impl ExtractiveReader {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k: top_k.max(1),
            window: DEFAULT_WINDOW,
        }
    }

    /// Override the answer window size, in words.
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    #[instrument(skip_all, fields(documents = documents.len()))]
    fn extract(&self, query: &str, documents: &[Document]) -> Vec<Answer> {
        let terms = query_terms(query);
        if terms.is_empty() {
            debug!("query has no content terms, no answers");
            return Vec::new();
        }

        let weights = term_weights(&terms, documents);

        let mut answers: Vec<Answer> = documents
            .iter()
            .filter(|doc| doc.table.is_none())
            .filter_map(|doc| self.best_span(doc, &terms, &weights))
            .collect();

        answers.sort_by(|a, b| b.score.total_cmp(&a.score));
        answers.truncate(self.top_k);

        debug!(answers = answers.len(), "span extraction complete");
        answers
    }

    /// Best-scoring window in one document, if any term matches at all.
    fn best_span(
        &self,
        doc: &Document,
        terms: &[String],
        weights: &HashMap<String, f32>,
    ) -> Option<Answer> {
        let words = tokenize(&doc.content);
        if words.is_empty() {
            return None;
        }

        let total_weight: f32 = terms.iter().map(|t| weights[t]).sum();
        let stride = (self.window / 2).max(1);

        let mut best: Option<(f32, usize, usize)> = None;
        let mut start = 0;
        loop {
            let end = (start + self.window).min(words.len());
            let window = &words[start..end];

            let matched: f32 = terms
                .iter()
                .filter(|term| window.iter().any(|w| w.text == **term))
                .map(|term| weights[term])
                .sum();
            let score = matched / total_weight;

            if score > 0.0 && best.is_none_or(|(s, _, _)| score > s) {
                best = Some((score, start, end));
            }

            if end == words.len() {
                break;
            }
            start += stride;
        }

        let (score, from, to) = best?;
        let span = (words[from].start, words[to - 1].end);
        let text: String = doc
            .content
            .chars()
            .skip(span.0)
            .take(span.1 - span.0)
            .collect();

        Some(Answer {
            text,
            score,
            document_id: doc.id.clone(),
            span: Some(span),
            cells: None,
            aggregation: None,
        })
    }
}

impl Component for ExtractiveReader {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("query", FieldType::Text),
            FieldSpec::required("documents", FieldType::Documents),
        ]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("answers", FieldType::Answers)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let query = inputs
                .get("query")
                .and_then(Value::as_text)
                .ok_or_else(|| RaglineError::validation("reader input 'query' is not text"))?;
            let documents = inputs
                .get("documents")
                .and_then(Value::as_documents)
                .ok_or_else(|| {
                    RaglineError::validation("reader input 'documents' is not a document list")
                })?;

            let answers = self.extract(query, documents);

            let mut out = OutputMap::new();
            out.insert("answers".into(), Value::Answers(answers));
            Ok(out)
        })
    }
}

// ---------------------------------------------------------------------------
// Tokenization and weighting
// ---------------------------------------------------------------------------

struct Word {
    text: String,
    /// Char offset of the first char.
    start: usize,
    /// Char offset one past the last char.
    end: usize,
}

/// Lowercased alphanumeric words with their char offsets.
fn tokenize(content: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut word_start = 0;

    for (offset, c) in content.chars().enumerate() {
        if c.is_alphanumeric() {
            if current.is_empty() {
                word_start = offset;
            }
            current.extend(c.to_lowercase());
        } else if !current.is_empty() {
            words.push(Word {
                text: std::mem::take(&mut current),
                start: word_start,
                end: offset,
            });
        }
    }
    if !current.is_empty() {
        words.push(Word {
            text: current,
            start: word_start,
            end: content.chars().count(),
        });
    }

    words
}

/// Inverse-frequency term weights over the document set: terms appearing in
/// fewer documents discriminate more.
fn term_weights(terms: &[String], documents: &[Document]) -> HashMap<String, f32> {
    let n = documents.len().max(1) as f32;
    terms
        .iter()
        .map(|term| {
            let df = documents
                .iter()
                .filter(|doc| doc.content.to_lowercase().contains(term.as_str()))
                .count() as f32;
            (term.clone(), (1.0 + n / (1.0 + df)).ln())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Document> {
        vec![
            Document::from_text(
                "Rust is a systems programming language. The borrow checker enforces \
                 memory safety without a garbage collector.",
            ),
            Document::from_text("Python is a popular language for data science and scripting."),
            Document::from_text("Cooking pasta requires salted boiling water."),
        ]
    }

    #[test]
    fn finds_span_containing_the_answer() {
        let docs = corpus();
        let reader = ExtractiveReader::new(3);
        let answers = reader.extract("What enforces memory safety?", &docs);

        assert!(!answers.is_empty());
        assert!(answers[0].text.contains("borrow checker"));
        assert_eq!(answers[0].document_id, docs[0].id);
    }

    #[test]
    fn spans_carry_char_offsets_into_the_document() {
        let docs = corpus();
        let reader = ExtractiveReader::new(1);
        let answers = reader.extract("borrow checker", &docs);

        let answer = &answers[0];
        let doc = docs
            .iter()
            .find(|d| d.id == answer.document_id)
            .expect("answer references a known document");
        let (from, to) = answer.span.expect("extractive answers have spans");
        let slice: String = doc.content.chars().skip(from).take(to - from).collect();
        assert_eq!(slice, answer.text);
    }

    #[test]
    fn answers_are_sorted_best_first_and_truncated() {
        let reader = ExtractiveReader::new(2);
        let answers = reader.extract("programming language", &corpus());

        assert!(answers.len() <= 2);
        for pair in answers.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn stopword_only_query_yields_no_answers() {
        let reader = ExtractiveReader::new(3);
        assert!(reader.extract("what is the", &corpus()).is_empty());
    }

    #[test]
    fn table_documents_are_skipped() {
        let table_doc = Document::from_table(ragline_shared::Table {
            headers: vec!["language".into()],
            rows: vec![vec!["Rust".into()]],
        });
        let reader = ExtractiveReader::new(3);
        assert!(reader.extract("Rust", &[table_doc]).is_empty());
    }

    #[tokio::test]
    async fn runs_as_component() {
        let reader = ExtractiveReader::new(1);
        let mut inputs = InputMap::new();
        inputs.insert("query".into(), Value::Text("memory safety".into()));
        inputs.insert("documents".into(), Value::Documents(corpus()));

        let out = reader.invoke(inputs).await.unwrap();
        let answers = out.get("answers").and_then(Value::as_answers).unwrap();
        assert_eq!(answers.len(), 1);
        assert!(answers[0].score > 0.0);
    }
}
