//! Document storage and retrieval components.
//!
//! An [`InMemoryStore`] holds the corpus for one pipeline; [`StoreWriter`]
//! fills it, and [`Bm25Retriever`] / [`EmbeddingRetriever`] query it. The
//! store is shared between writer and retriever through an `Arc`, while the
//! pass-through `documents` edge between them gives the graph executor the
//! ordering dependency (write before read).

mod bm25;
mod dense;
mod embedder;
mod store;
mod writer;

pub use bm25::Bm25Retriever;
pub use dense::EmbeddingRetriever;
pub use embedder::{ApiEmbedder, Embedder};
pub use store::InMemoryStore;
pub use writer::StoreWriter;
