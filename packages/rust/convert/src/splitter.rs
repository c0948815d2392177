//! Word-window document splitting.

use futures::future::BoxFuture;
use tracing::debug;

use ragline_graph::Component;
use ragline_shared::{
    Document, DocumentId, FieldSpec, FieldType, InputMap, OutputMap, RaglineError, Result, Value,
};

/// Splits text documents into overlapping word-window chunks.
///
/// Inputs: `documents: Documents` (required). Outputs: `documents: Documents`.
///
/// Each chunk inherits the parent's title and source URL and records its
/// provenance (`parent_id`, `chunk_index`) in metadata. Table documents and
/// documents at or under the window size pass through unchanged. Chunk ids
/// are derived from the parent id and chunk index, so splitting the same
/// documents twice yields identical chunks.
#[derive(Debug, Clone)]
pub struct DocumentSplitter {
    window: usize,
    overlap: usize,
}

impl DocumentSplitter {
    /// Create a splitter with the given window and overlap, in words.
    pub fn new(window: usize, overlap: usize) -> Result<Self> {
        if window == 0 {
            return Err(RaglineError::config("split window must be at least 1 word"));
        }
        if overlap >= window {
            return Err(RaglineError::config(format!(
                "split overlap ({overlap}) must be smaller than the window ({window})"
            )));
        }
        Ok(Self { window, overlap })
    }

    fn split_document(&self, doc: &Document) -> Vec<Document> {
        if doc.table.is_some() {
            return vec![doc.clone()];
        }

        let words: Vec<&str> = doc.content.split_whitespace().collect();
        if words.len() <= self.window {
            return vec![doc.clone()];
        }

        let stride = self.window - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < words.len() {
            let end = (start + self.window).min(words.len());
            let content = words[start..end].join(" ");
            let index = chunks.len();

            let mut chunk = Document {
                id: DocumentId::derived(&[&doc.id.to_string(), &index.to_string()]),
                content,
                title: doc.title.clone(),
                source_url: doc.source_url.clone(),
                table: None,
                embedding: None,
                meta: doc.meta.clone(),
            };
            chunk
                .meta
                .insert("parent_id".into(), serde_json::Value::from(doc.id.to_string()));
            chunk
                .meta
                .insert("chunk_index".into(), serde_json::Value::from(index));
            chunks.push(chunk);

            if end == words.len() {
                break;
            }
            start += stride;
        }

        chunks
    }
}

impl Component for DocumentSplitter {
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
                    RaglineError::validation("splitter input 'documents' is not a document list")
                })?;

            let chunks: Vec<Document> = documents
                .iter()
                .flat_map(|doc| self.split_document(doc))
                .collect();

            debug!(
                documents = documents.len(),
                chunks = chunks.len(),
                window = self.window,
                overlap = self.overlap,
                "documents split"
            );

            let mut out = OutputMap::new();
            out.insert("documents".into(), Value::Documents(chunks));
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_shared::Table;

    fn doc(words: usize) -> Document {
        let content = (0..words).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        Document::from_text(content).with_source_url("https://example.com/doc")
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(DocumentSplitter::new(0, 0).is_err());
        assert!(DocumentSplitter::new(10, 10).is_err());
        assert!(DocumentSplitter::new(10, 20).is_err());
        assert!(DocumentSplitter::new(10, 9).is_ok());
    }

    #[test]
    fn short_document_passes_through() {
        let splitter = DocumentSplitter::new(50, 10).unwrap();
        let original = doc(20);
        let chunks = splitter.split_document(&original);
        assert_eq!(chunks, vec![original]);
    }

    #[test]
    fn splits_with_overlap() {
        let splitter = DocumentSplitter::new(10, 3).unwrap();
        let chunks = splitter.split_document(&doc(25));

        // stride 7: windows [0..10), [7..17), [14..24), [21..25)
        assert_eq!(chunks.len(), 4);
        assert!(chunks[0].content.starts_with("w0 "));
        assert!(chunks[1].content.starts_with("w7 "));
        assert!(chunks[2].content.starts_with("w14 "));
        assert!(chunks[3].content.ends_with(" w24"));

        // Overlapping words appear in consecutive chunks
        assert!(chunks[0].content.contains("w9"));
        assert!(chunks[1].content.contains("w9"));
    }

    #[test]
    fn chunks_record_provenance() {
        let splitter = DocumentSplitter::new(5, 1).unwrap();
        let parent = doc(12);
        let chunks = splitter.split_document(&parent);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(
                chunk.meta["parent_id"],
                serde_json::Value::from(parent.id.to_string())
            );
            assert_eq!(chunk.meta["chunk_index"], serde_json::Value::from(i));
            assert_eq!(chunk.source_url, parent.source_url);
            assert_ne!(chunk.id, parent.id);
        }
    }

    #[test]
    fn table_documents_pass_through() {
        let splitter = DocumentSplitter::new(2, 0).unwrap();
        let table_doc = Document::from_table(Table {
            headers: vec!["a".into(), "b".into()],
            rows: vec![vec!["1".into(), "2".into()]],
        });

        let chunks = splitter.split_document(&table_doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, table_doc.id);
    }

    #[test]
    fn splitting_is_deterministic() {
        let splitter = DocumentSplitter::new(8, 2).unwrap();
        let parent = doc(30);
        assert_eq!(splitter.split_document(&parent), splitter.split_document(&parent));
    }

    #[tokio::test]
    async fn runs_as_component() {
        let splitter = DocumentSplitter::new(10, 2).unwrap();
        let mut inputs = InputMap::new();
        inputs.insert("documents".into(), Value::Documents(vec![doc(30)]));

        let out = splitter.invoke(inputs).await.unwrap();
        let chunks = out.get("documents").and_then(Value::as_documents).unwrap();
        assert!(chunks.len() > 1);
    }
}
