//! The built-in docs-QA pipeline preset.

use std::sync::Arc;

use url::Url;

use ragline_convert::{DocumentSplitter, HtmlConverter};
use ragline_fetch::UrlFetcher;
use ragline_generate::{ChatModel, DEFAULT_TEMPLATE, Generator, PromptBuilder};
use ragline_graph::{Pipeline, RunRequest};
use ragline_reader::ExtractiveReader;
use ragline_retrieval::{Bm25Retriever, Embedder, EmbeddingRetriever, InMemoryStore, StoreWriter};
use ragline_shared::{AppConfig, RaglineError, Result, Value};

/// How the final answer is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum Mode {
    /// Retrieved context is fed through a prompt into a chat model.
    Generative,
    /// Answer spans are extracted directly from retrieved documents.
    Extractive,
}

impl Mode {
    pub(crate) fn from_config(value: &str) -> Result<Self> {
        match value {
            "generative" => Ok(Self::Generative),
            "extractive" => Ok(Self::Extractive),
            other => Err(RaglineError::config(format!(
                "unknown mode '{other}': expected 'generative' or 'extractive'"
            ))),
        }
    }
}

/// Which retriever ranks the stored documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum RetrieverKind {
    Bm25,
    Embedding,
}

impl RetrieverKind {
    pub(crate) fn from_config(value: &str) -> Result<Self> {
        match value {
            "bm25" => Ok(Self::Bm25),
            "embedding" => Ok(Self::Embedding),
            other => Err(RaglineError::config(format!(
                "unknown retriever '{other}': expected 'bm25' or 'embedding'"
            ))),
        }
    }
}

/// Assembles the standard docs-QA graph:
/// fetcher → converter → splitter → writer → retriever → prompt builder →
/// generator (generative mode) or reader (extractive mode).
pub(crate) struct DocsQa {
    pub mode: Mode,
    pub retriever: RetrieverKind,
    pub top_k: usize,
    /// Required in generative mode.
    pub chat: Option<Arc<dyn ChatModel>>,
    /// Required for the embedding retriever.
    pub embedder: Option<Arc<dyn Embedder>>,
    /// Let the fetcher reach localhost (tests against mock servers).
    pub allow_local_urls: bool,
}

impl DocsQa {
    pub(crate) fn build(self, config: &AppConfig) -> Result<Pipeline> {
        let store = Arc::new(InMemoryStore::new());
        let mut pipeline = Pipeline::new();

        let mut fetcher = UrlFetcher::new(&config.fetch)?;
        if self.allow_local_urls {
            fetcher = fetcher.allow_localhost();
        }
        pipeline.add_component("fetcher", Arc::new(fetcher))?;
        pipeline.add_component("converter", Arc::new(HtmlConverter::new()))?;
        pipeline.add_component(
            "splitter",
            Arc::new(DocumentSplitter::new(
                config.defaults.split_words,
                config.defaults.split_overlap,
            )?),
        )?;

        let mut writer = StoreWriter::new(store.clone());
        if let Some(embedder) = &self.embedder {
            writer = writer.with_embedder(embedder.clone());
        }
        pipeline.add_component("writer", Arc::new(writer))?;

        match self.retriever {
            RetrieverKind::Bm25 => {
                pipeline.add_component(
                    "retriever",
                    Arc::new(Bm25Retriever::new(store.clone(), self.top_k)),
                )?;
            }
            RetrieverKind::Embedding => {
                let embedder = self.embedder.clone().ok_or_else(|| {
                    RaglineError::config("embedding retriever needs a model backend")
                })?;
                pipeline.add_component(
                    "retriever",
                    Arc::new(EmbeddingRetriever::new(store.clone(), embedder, self.top_k)),
                )?;
            }
        }

        pipeline.connect("fetcher", "converter")?;
        pipeline.connect("converter", "splitter")?;
        pipeline.connect("splitter", "writer")?;
        // The retriever reads the shared store; this edge orders it after
        // the write.
        pipeline.connect_fields("writer", "documents", "retriever", "documents")?;

        match self.mode {
            Mode::Generative => {
                let chat = self
                    .chat
                    .ok_or_else(|| RaglineError::config("generative mode needs a chat model"))?;
                pipeline.add_component("prompt_builder", Arc::new(PromptBuilder::new(DEFAULT_TEMPLATE)?))?;
                pipeline.add_component("generator", Arc::new(Generator::new(chat)))?;
                pipeline.connect_fields("retriever", "documents", "prompt_builder", "documents")?;
                pipeline.connect("prompt_builder", "generator")?;
            }
            Mode::Extractive => {
                pipeline.add_component("reader", Arc::new(ExtractiveReader::new(self.top_k)))?;
                pipeline.connect_fields("retriever", "documents", "reader", "documents")?;
            }
        }

        Ok(pipeline)
    }
}

/// Overrides seeding the standard graph: URLs into the fetcher, the query
/// into the retriever and the answering component.
pub(crate) fn docs_qa_request(urls: Vec<Url>, query: &str, mode: Mode) -> RunRequest {
    let answerer = match mode {
        Mode::Generative => "prompt_builder",
        Mode::Extractive => "reader",
    };
    RunRequest::new()
        .with_input("fetcher", "urls", Value::Urls(urls))
        .with_input("retriever", "query", Value::Text(query.to_string()))
        .with_input(answerer, "query", Value::Text(query.to_string()))
}
