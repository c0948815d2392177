//! In-memory document store shared between writer and retriever components.

use tokio::sync::RwLock;
use tracing::debug;

use ragline_shared::{Document, DocumentId, Result};

use crate::embedder::Embedder;

/// Insertion-ordered in-memory document store.
///
/// Writes upsert by document id; rewriting a document with unchanged content
/// keeps its existing embedding so unchanged corpora are not re-embedded.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<Vec<Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert documents by id. Returns how many were newly inserted.
    pub async fn write(&self, incoming: Vec<Document>) -> usize {
        let mut documents = self.documents.write().await;
        let mut inserted = 0;

        for mut doc in incoming {
            match documents.iter_mut().find(|existing| existing.id == doc.id) {
                Some(existing) => {
                    if doc.embedding.is_none() && existing.content == doc.content {
                        doc.embedding = existing.embedding.take();
                    }
                    *existing = doc;
                }
                None => {
                    documents.push(doc);
                    inserted += 1;
                }
            }
        }

        debug!(inserted, total = documents.len(), "documents written to store");
        inserted
    }

    /// Embed every stored document that does not have an embedding yet.
    /// Returns how many embeddings were computed.
    pub async fn update_embeddings(&self, embedder: &dyn Embedder) -> Result<usize> {
        let pending: Vec<(DocumentId, String)> = {
            let documents = self.documents.read().await;
            documents
                .iter()
                .filter(|doc| doc.embedding.is_none())
                .map(|doc| (doc.id.clone(), embeddable_text(doc)))
                .filter(|(_, text)| !text.is_empty())
                .collect()
        };

        if pending.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = pending.iter().map(|(_, text)| text.clone()).collect();
        let embeddings = embedder.embed(texts).await?;

        let mut documents = self.documents.write().await;
        let mut updated = 0;
        for ((id, _), embedding) in pending.into_iter().zip(embeddings) {
            if let Some(doc) = documents.iter_mut().find(|doc| doc.id == id) {
                doc.embedding = Some(embedding);
                updated += 1;
            }
        }

        debug!(updated, "document embeddings updated");
        Ok(updated)
    }

    /// Snapshot of all stored documents, in insertion order.
    pub async fn all(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    pub async fn get(&self, id: &DocumentId) -> Option<Document> {
        self.documents
            .read()
            .await
            .iter()
            .find(|doc| &doc.id == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

/// Text a document is indexed and embedded under: its content, or the
/// linearized cells for pure table documents.
pub(crate) fn embeddable_text(doc: &Document) -> String {
    if !doc.content.is_empty() {
        return doc.content.clone();
    }
    match &doc.table {
        Some(table) => {
            let mut parts: Vec<&str> = table.headers.iter().map(String::as_str).collect();
            parts.extend(table.linearize());
            parts.join(" ")
        }
        None => String::new(),
    }
}
