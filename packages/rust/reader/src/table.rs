//! Table reader over structured table documents.

use std::sync::LazyLock;

use futures::future::BoxFuture;
use regex::Regex;
use tracing::{debug, instrument};

use ragline_graph::Component;
use ragline_shared::{
    Aggregation, Answer, Document, FieldSpec, FieldType, InputMap, OutputMap, RaglineError,
    Result, Table, Value,
};

use crate::query_terms;

/// Answers questions over table documents.
///
/// Inputs: `query: Text`, `documents: Documents` (both required). Outputs:
/// `answers: Answers`.
///
/// Cells are addressed by their offset in the table's row-major linearized
/// sequence. A cell scores by query-term overlap with its own text, boosted
/// when its column header matches the query too. Count-style questions
/// ("how many ...") collapse each table's matches into one aggregated
/// answer carrying every matched cell offset.
pub struct TableReader {
    top_k: usize,
}

static COUNT_QUESTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(how\s+many|count)\b").expect("valid regex"));

impl TableReader {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k: top_k.max(1),
        }
    }

    #[instrument(skip_all, fields(documents = documents.len()))]
    fn answer(&self, query: &str, documents: &[Document]) -> Vec<Answer> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Vec::new();
        }
        let count_question = COUNT_QUESTION.is_match(query);

        let mut answers = Vec::new();
        for doc in documents {
            let Some(table) = &doc.table else { continue };
            let scored = score_cells(table, &terms);
            if scored.is_empty() {
                continue;
            }

            if count_question {
                let cells: Vec<usize> = scored.iter().map(|(offset, _, _)| *offset).collect();
                let best = scored
                    .iter()
                    .map(|(_, _, score)| *score)
                    .fold(0.0f32, f32::max);
                answers.push(Answer {
                    text: cells.len().to_string(),
                    score: best,
                    document_id: doc.id.clone(),
                    span: None,
                    cells: Some(cells),
                    aggregation: Some(Aggregation::Count),
                });
            } else {
                for (offset, text, score) in scored {
                    answers.push(Answer {
                        text,
                        score,
                        document_id: doc.id.clone(),
                        span: None,
                        cells: Some(vec![offset]),
                        aggregation: None,
                    });
                }
            }
        }

        answers.sort_by(|a, b| b.score.total_cmp(&a.score));
        answers.truncate(self.top_k);

        debug!(answers = answers.len(), count_question, "table reading complete");
        answers
    }
}

/// Matching cells as `(linearized offset, cell text, score)`.
fn score_cells(table: &Table, terms: &[String]) -> Vec<(usize, String, f32)> {
    let header_matches: Vec<bool> = table
        .headers
        .iter()
        .map(|header| {
            let lower = header.to_lowercase();
            terms.iter().any(|term| lower.contains(term.as_str()))
        })
        .collect();

    let mut scored = Vec::new();
    for (offset, cell) in table.linearize().iter().enumerate() {
        let lower = cell.to_lowercase();
        let matched = terms
            .iter()
            .filter(|term| lower.contains(term.as_str()))
            .count();

        let column = offset % table.headers.len().max(1);
        let header_boost = if header_matches.get(column).copied().unwrap_or(false) {
            0.5
        } else {
            0.0
        };

        if matched > 0 || header_boost > 0.0 {
            let score = (matched as f32 / terms.len() as f32 + header_boost).min(1.0);
            scored.push((offset, cell.to_string(), score));
        }
    }

    scored
}

impl Component for TableReader {
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

            let answers = self.answer(query, documents);

            let mut out = OutputMap::new();
            out.insert("answers".into(), Value::Answers(answers));
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cities_table() -> Document {
        Document::from_table(Table {
            headers: vec!["name".into(), "city".into()],
            rows: vec![
                vec!["Ada".into(), "London".into()],
                vec!["Grace".into(), "Arlington".into()],
                vec!["Alan".into(), "London".into()],
            ],
        })
    }

    #[test]
    fn locates_matching_cells_by_offset() {
        let doc = cities_table();
        let reader = TableReader::new(5);
        let answers = reader.answer("Who lives in London?", &[doc.clone()]);

        assert!(!answers.is_empty());
        let best = &answers[0];
        assert_eq!(best.text, "London");
        // "London" appears at linearized offsets 1 and 5
        let offsets: Vec<usize> = answers
            .iter()
            .filter(|a| a.text == "London")
            .flat_map(|a| a.cells.clone().unwrap())
            .collect();
        assert_eq!(offsets, vec![1, 5]);
        assert_eq!(best.document_id, doc.id);
    }

    #[test]
    fn count_questions_aggregate_matches() {
        let doc = cities_table();
        let reader = TableReader::new(5);
        let answers = reader.answer("How many people live in London?", &[doc]);

        assert_eq!(answers.len(), 1);
        let answer = &answers[0];
        assert_eq!(answer.text, "2");
        assert_eq!(answer.aggregation, Some(Aggregation::Count));
        assert_eq!(answer.cells, Some(vec![1, 5]));
        assert!(answer.span.is_none());
    }

    #[test]
    fn header_match_boosts_column_cells() {
        let doc = cities_table();
        let reader = TableReader::new(10);
        let answers = reader.answer("city of Grace", &[doc]);

        // "Grace" matches a name cell; the "city" header boosts that column.
        assert!(answers.iter().any(|a| a.text == "Grace"));
        assert!(answers.iter().any(|a| a.text == "Arlington"));
    }

    #[test]
    fn text_documents_are_ignored() {
        let reader = TableReader::new(5);
        let doc = Document::from_text("London is the capital of England.");
        assert!(reader.answer("London", &[doc]).is_empty());
    }

    #[tokio::test]
    async fn runs_as_component() {
        let reader = TableReader::new(3);
        let mut inputs = InputMap::new();
        inputs.insert("query".into(), Value::Text("how many rows mention London".into()));
        inputs.insert("documents".into(), Value::Documents(vec![cities_table()]));

        let out = reader.invoke(inputs).await.unwrap();
        let answers = out.get("answers").and_then(Value::as_answers).unwrap();
        assert_eq!(answers[0].aggregation, Some(Aggregation::Count));
    }
}
