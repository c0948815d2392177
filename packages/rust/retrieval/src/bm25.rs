//! BM25 retriever backed by tantivy.

use std::sync::Arc;

use futures::future::BoxFuture;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{STORED, STRING, Schema, TEXT, Value as _};
use tantivy::{Index, TantivyDocument, doc};
use tracing::{debug, instrument};

use ragline_graph::Component;
use ragline_shared::{
    Document, DocumentId, FieldSpec, FieldType, InputMap, OutputMap, RaglineError, Result, Value,
};

use crate::store::{InMemoryStore, embeddable_text};

/// Keyword retriever scoring stored documents with BM25.
///
/// Inputs: `query: Text` (required), `documents: Documents` (optional; used
/// only as an ordering dependency on the store writer). Outputs: `documents`
/// ranked by score, best first, with the score recorded in metadata.
///
/// The tantivy index is built in RAM from the store on every invocation;
/// pipeline corpora are small and rebuilt per run anyway.
pub struct Bm25Retriever {
    store: Arc<InMemoryStore>,
    top_k: usize,
}

impl Bm25Retriever {
    pub fn new(store: Arc<InMemoryStore>, top_k: usize) -> Self {
        Self {
            store,
            top_k: top_k.max(1),
        }
    }

    #[instrument(skip_all, fields(top_k = self.top_k))]
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let corpus = self.store.all().await;
        if corpus.is_empty() {
            debug!("store is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let mut schema_builder = Schema::builder();
        let id_field = schema_builder.add_text_field("doc_id", STRING | STORED);
        let content_field = schema_builder.add_text_field("content", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);
        let mut writer: tantivy::IndexWriter = index
            .writer(50_000_000)
            .map_err(|e| RaglineError::Index(format!("index writer: {e}")))?;

        for document in &corpus {
            writer
                .add_document(doc!(
                    id_field => document.id.to_string(),
                    content_field => embeddable_text(document),
                ))
                .map_err(|e| RaglineError::Index(format!("index add: {e}")))?;
        }
        writer
            .commit()
            .map_err(|e| RaglineError::Index(format!("index commit: {e}")))?;

        let reader = index
            .reader()
            .map_err(|e| RaglineError::Index(format!("index reader: {e}")))?;
        let searcher = reader.searcher();

        let parser = QueryParser::for_index(&index, vec![content_field]);
        // Lenient: free-text questions contain characters the query syntax
        // would otherwise reject.
        let (parsed, _errors) = parser.parse_query_lenient(query);

        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(self.top_k))
            .map_err(|e| RaglineError::Index(format!("search: {e}")))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let hit: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| RaglineError::Index(format!("doc fetch: {e}")))?;

            let Some(id_str) = hit.get_first(id_field).and_then(|v| v.as_str()) else {
                continue;
            };
            let id: DocumentId = id_str
                .parse()
                .map_err(|_| RaglineError::Index(format!("bad doc id in index: {id_str}")))?;

            if let Some(mut document) = self.store.get(&id).await {
                document
                    .meta
                    .insert("score".into(), serde_json::Value::from(score as f64));
                results.push(document);
            }
        }

        debug!(query, results = results.len(), "bm25 retrieval complete");
        Ok(results)
    }
}

impl Component for Bm25Retriever {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("query", FieldType::Text),
            // Ordering dependency on the store writer; the payload itself is
            // not read, the shared store is.
            FieldSpec::optional("documents", FieldType::Documents),
        ]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("documents", FieldType::Documents)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let query = inputs
                .get("query")
                .and_then(Value::as_text)
                .ok_or_else(|| RaglineError::validation("retriever input 'query' is not text"))?
                .to_string();

            let documents = self.retrieve(&query).await?;

            let mut out = OutputMap::new();
            out.insert("documents".into(), Value::Documents(documents));
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .write(vec![
                Document::from_text("Rust is a systems programming language"),
                Document::from_text("Python is great for data science"),
                Document::from_text("The borrow checker enforces memory safety in Rust"),
            ])
            .await;
        store
    }

    #[tokio::test]
    async fn ranks_keyword_matches_first() {
        let retriever = Bm25Retriever::new(seeded_store().await, 3);
        let results = retriever.retrieve("systems programming").await.unwrap();

        assert!(!results.is_empty());
        assert!(results[0].content.contains("systems programming"));
        assert!(results[0].meta.contains_key("score"));
    }

    #[tokio::test]
    async fn respects_top_k() {
        let retriever = Bm25Retriever::new(seeded_store().await, 1);
        let results = retriever.retrieve("Rust").await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn empty_store_returns_no_documents() {
        let retriever = Bm25Retriever::new(Arc::new(InMemoryStore::new()), 5);
        assert!(retriever.retrieve("anything").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn free_text_questions_do_not_break_query_parsing() {
        let retriever = Bm25Retriever::new(seeded_store().await, 3);
        let results = retriever
            .retrieve("what enforces memory safety? (in Rust)")
            .await
            .unwrap();
        assert!(results.iter().any(|doc| doc.content.contains("borrow checker")));
    }

    #[tokio::test]
    async fn runs_as_component() {
        let retriever = Bm25Retriever::new(seeded_store().await, 2);
        let mut inputs = InputMap::new();
        inputs.insert("query".into(), Value::Text("data science".into()));

        let out = retriever.invoke(inputs).await.unwrap();
        let docs = out.get("documents").and_then(Value::as_documents).unwrap();
        assert!(docs[0].content.contains("Python"));
    }
}
