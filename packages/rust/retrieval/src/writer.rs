//! Store-writer component.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use ragline_graph::Component;
use ragline_shared::{
    Document, FieldSpec, FieldType, InputMap, OutputMap, RaglineError, Result, Value,
};

use crate::embedder::Embedder;
use crate::store::InMemoryStore;

/// Writes incoming documents into the shared store, embedding them when a
/// backend is configured.
///
/// Inputs: `documents: Documents` (required). Outputs: `documents` as stored
/// (embeddings included). The pass-through output is what downstream
/// retrievers connect to, making the write-before-read ordering explicit in
/// the graph.
pub struct StoreWriter {
    store: Arc<InMemoryStore>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl StoreWriter {
    pub fn new(store: Arc<InMemoryStore>) -> Self {
        Self {
            store,
            embedder: None,
        }
    }

    /// Attach an embedding backend; stored documents without embeddings get
    /// one after each write.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

impl Component for StoreWriter {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("documents", FieldType::Documents)]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("documents", FieldType::Documents)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let documents = inputs
                .get("documents")
                .and_then(Value::as_documents)
                .ok_or_else(|| {
                    RaglineError::validation("writer input 'documents' is not a document list")
                })?
                .to_vec();

            let ids: Vec<_> = documents.iter().map(|doc| doc.id.clone()).collect();
            let inserted = self.store.write(documents).await;

            if let Some(embedder) = &self.embedder {
                let embedded = self.store.update_embeddings(embedder.as_ref()).await?;
                debug!(inserted, embedded, "store write complete");
            } else {
                debug!(inserted, "store write complete");
            }

            // Re-read so the output reflects stored state, embeddings included.
            let mut stored = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(doc) = self.store.get(id).await {
                    stored.push(doc);
                }
            }

            let mut out = OutputMap::new();
            out.insert("documents".into(), Value::Documents(stored));
            Ok(out)
        })
    }
}
