//! Embedding retriever (cosine similarity over stored vectors).

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, instrument};

use ragline_graph::Component;
use ragline_shared::{
    Document, FieldSpec, FieldType, InputMap, OutputMap, RaglineError, Result, Value,
};

use crate::embedder::Embedder;
use crate::store::InMemoryStore;

/// Semantic retriever ranking stored documents by cosine similarity between
/// the embedded query and stored document embeddings.
///
/// Same field contract as the BM25 retriever: `query: Text` required,
/// `documents: Documents` as an optional ordering dependency, ranked
/// `documents` out. Documents without embeddings are skipped.
pub struct EmbeddingRetriever {
    store: Arc<InMemoryStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl EmbeddingRetriever {
    pub fn new(store: Arc<InMemoryStore>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            store,
            embedder,
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

        let query_embedding = self
            .embedder
            .embed(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RaglineError::Model("embedder returned no vector for query".into()))?;

        let mut scored: Vec<(f32, Document)> = corpus
            .into_iter()
            .filter_map(|doc| {
                let embedding = doc.embedding.as_ref()?;
                Some((cosine_similarity(&query_embedding, embedding), doc))
            })
            .collect();

        // total_cmp keeps the sort stable even if a degenerate vector
        // produced a NaN score.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(self.top_k);

        let results: Vec<Document> = scored
            .into_iter()
            .map(|(score, mut doc)| {
                doc.meta
                    .insert("score".into(), serde_json::Value::from(score as f64));
                doc
            })
            .collect();

        debug!(query, results = results.len(), "embedding retrieval complete");
        Ok(results)
    }
}

/// Cosine similarity; zero-norm vectors score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl Component for EmbeddingRetriever {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("query", FieldType::Text),
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
    use crate::writer::test_embedder::TermCountEmbedder;

    #[test]
    fn cosine_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn ranks_by_similarity_to_query() {
        let embedder = Arc::new(TermCountEmbedder(vec!["rust", "python"]));
        let store = Arc::new(InMemoryStore::new());
        store
            .write(vec![
                Document::from_text("rust rust rust"),
                Document::from_text("python python"),
                Document::from_text("nothing relevant"),
            ])
            .await;
        store.update_embeddings(embedder.as_ref()).await.unwrap();

        let retriever = EmbeddingRetriever::new(store, embedder, 2);
        let results = retriever.retrieve("tell me about python").await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].content.contains("python"));
        assert!(results[0].meta.contains_key("score"));
    }

    #[tokio::test]
    async fn skips_documents_without_embeddings() {
        let embedder = Arc::new(TermCountEmbedder(vec!["rust"]));
        let store = Arc::new(InMemoryStore::new());
        store.write(vec![Document::from_text("rust")]).await;
        // No update_embeddings call: nothing is retrievable.

        let retriever = EmbeddingRetriever::new(store, embedder, 5);
        assert!(retriever.retrieve("rust").await.unwrap().is_empty());
    }
}
