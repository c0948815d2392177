//! Prompt-builder component.

use std::sync::LazyLock;

use futures::future::BoxFuture;
use regex::Regex;
use tracing::debug;

use ragline_graph::Component;
use ragline_shared::{
    Document, FieldSpec, FieldType, InputMap, OutputMap, RaglineError, Result, Value,
};

/// Default question-answering template.
pub const DEFAULT_TEMPLATE: &str = "\
Answer the question using only the context below.

Context:
{documents}

Question: {query}
Answer:";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("valid regex"));

/// Renders a prompt from a template with `{query}` and `{documents}`
/// placeholders.
///
/// Inputs: `query: Text` (required), `documents: Documents` (optional).
/// Outputs: `prompt: Text`. Templates referencing any other placeholder are
/// rejected at construction time, not at run time.
#[derive(Debug)]
pub struct PromptBuilder {
    template: String,
}

impl PromptBuilder {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();

        for capture in PLACEHOLDER.captures_iter(&template) {
            let name = &capture[1];
            if name != "query" && name != "documents" {
                return Err(RaglineError::config(format!(
                    "unknown template placeholder {{{name}}}; expected {{query}} or {{documents}}"
                )));
            }
        }

        Ok(Self { template })
    }

    fn render(&self, query: &str, documents: &[Document]) -> String {
        let context = if documents.is_empty() {
            "(no documents)".to_string()
        } else {
            documents
                .iter()
                .enumerate()
                .map(|(i, doc)| format!("[{}] {}", i + 1, document_text(doc)))
                .collect::<Vec<_>>()
                .join("\n")
        };

        self.template
            .replace("{query}", query)
            .replace("{documents}", &context)
    }
}

/// Text a document contributes to the context: its content, or rendered
/// rows for pure table documents.
fn document_text(doc: &Document) -> String {
    if !doc.content.is_empty() {
        return doc.content.clone();
    }
    match &doc.table {
        Some(table) => table
            .rows
            .iter()
            .map(|row| {
                table
                    .headers
                    .iter()
                    .zip(row)
                    .map(|(header, cell)| format!("{header}: {cell}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect::<Vec<_>>()
            .join("; "),
        None => String::new(),
    }
}

impl Component for PromptBuilder {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("query", FieldType::Text),
            FieldSpec::optional("documents", FieldType::Documents),
        ]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("prompt", FieldType::Text)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let query = inputs
                .get("query")
                .and_then(Value::as_text)
                .ok_or_else(|| {
                    RaglineError::validation("prompt builder input 'query' is not text")
                })?;
            let documents = inputs
                .get("documents")
                .and_then(Value::as_documents)
                .unwrap_or(&[]);

            let prompt = self.render(query, documents);
            debug!(prompt_len = prompt.len(), documents = documents.len(), "prompt rendered");

            let mut out = OutputMap::new();
            out.insert("prompt".into(), Value::Text(prompt));
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_shared::Table;

    #[test]
    fn substitutes_query_and_documents() {
        let builder = PromptBuilder::new("Q: {query}\nCtx: {documents}").unwrap();
        let docs = vec![
            Document::from_text("first passage"),
            Document::from_text("second passage"),
        ];

        let prompt = builder.render("why?", &docs);
        assert!(prompt.contains("Q: why?"));
        assert!(prompt.contains("[1] first passage"));
        assert!(prompt.contains("[2] second passage"));
    }

    #[test]
    fn unknown_placeholder_is_a_construction_error() {
        let err = PromptBuilder::new("Hello {user}, {query}").unwrap_err();
        assert!(err.to_string().contains("{user}"));

        // Repeated known placeholders are fine
        assert!(PromptBuilder::new("{query} {query} {documents}").is_ok());
    }

    #[test]
    fn table_documents_render_as_labelled_rows() {
        let builder = PromptBuilder::new(DEFAULT_TEMPLATE).unwrap();
        let doc = Document::from_table(Table {
            headers: vec!["name".into(), "city".into()],
            rows: vec![vec!["Ada".into(), "London".into()]],
        });

        let prompt = builder.render("who?", &[doc]);
        assert!(prompt.contains("name: Ada, city: London"));
    }

    #[tokio::test]
    async fn missing_documents_input_renders_placeholder_text() {
        let builder = PromptBuilder::new(DEFAULT_TEMPLATE).unwrap();
        let mut inputs = InputMap::new();
        inputs.insert("query".into(), Value::Text("anything".into()));

        let out = builder.invoke(inputs).await.unwrap();
        let prompt = out.get("prompt").and_then(Value::as_text).unwrap();
        assert!(prompt.contains("(no documents)"));
        assert!(prompt.contains("Question: anything"));
    }
}
