//! TOML pipeline definitions.
//!
//! `ragline run --pipeline graph.toml` builds a graph from an explicit
//! definition: a list of named components and a list of connections. Edges
//! are never inferred from the definition order; every connection is spelled
//! out.
//!
//! ```toml
//! [[component]]
//! name = "fetcher"
//! type = "fetcher"
//!
//! [[component]]
//! name = "retriever"
//! type = "bm25_retriever"
//! params = { top_k = 3 }
//!
//! [[connection]]
//! from = "writer"
//! to = "retriever"
//! output = "documents"
//! input = "documents"
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use url::Url;

use ragline_convert::{DocumentSplitter, HtmlConverter};
use ragline_fetch::UrlFetcher;
use ragline_generate::{ApiChatModel, ChatModel, DEFAULT_TEMPLATE, Generator, PromptBuilder};
use ragline_graph::{Component, Pipeline};
use ragline_reader::{ExtractiveReader, TableReader};
use ragline_retrieval::{
    ApiEmbedder, Bm25Retriever, Embedder, EmbeddingRetriever, InMemoryStore, StoreWriter,
};
use ragline_shared::{AppConfig, FieldSpec, FieldType, RaglineError, Result, Value};

/// Built-in component type names accepted in `type = "..."`.
pub(crate) const COMPONENT_KINDS: &[&str] = &[
    "fetcher",
    "converter",
    "splitter",
    "writer",
    "bm25_retriever",
    "embedding_retriever",
    "extractive_reader",
    "table_reader",
    "prompt_builder",
    "generator",
];

// ---------------------------------------------------------------------------
// Definition schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct PipelineDef {
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentDef>,

    #[serde(default, rename = "connection")]
    pub connections: Vec<ConnectionDef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ComponentDef {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub params: toml::Table,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectionDef {
    pub from: String,
    pub to: String,

    /// Explicit field pair; both or neither.
    pub output: Option<String>,
    pub input: Option<String>,
}

/// Parse a pipeline definition file.
pub(crate) fn load_pipeline_def(path: &Path) -> Result<PipelineDef> {
    let content = std::fs::read_to_string(path).map_err(|e| RaglineError::io(path, e))?;
    toml::from_str(&content)
        .map_err(|e| RaglineError::config(format!("failed to parse {}: {e}", path.display())))
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Whether model-backed components get real remote clients or inert stubs.
///
/// `ragline validate` checks structure only, so it must not demand an API
/// key for pipelines containing a generator or embedding retriever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuildMode {
    Run,
    ValidateOnly,
}

/// A graph built from a definition, with each component's input specs kept
/// around for typed `--input component.field=value` parsing.
#[derive(Debug)]
pub(crate) struct BuiltPipeline {
    pub pipeline: Pipeline,
    pub input_specs: BTreeMap<String, Vec<FieldSpec>>,
}

pub(crate) fn build_pipeline(
    def: &PipelineDef,
    config: &AppConfig,
    mode: BuildMode,
) -> Result<BuiltPipeline> {
    let mut factory = ComponentFactory::new(config, mode);
    let mut pipeline = Pipeline::new();
    let mut input_specs = BTreeMap::new();

    for component_def in &def.components {
        let component = factory.instantiate(&component_def.kind, &component_def.params)?;
        input_specs.insert(component_def.name.clone(), component.inputs());
        pipeline.add_component(&component_def.name, component)?;
    }

    for connection in &def.connections {
        match (&connection.output, &connection.input) {
            (Some(output), Some(input)) => {
                pipeline.connect_fields(&connection.from, output, &connection.to, input)?;
            }
            (None, None) => pipeline.connect(&connection.from, &connection.to)?,
            _ => {
                return Err(RaglineError::config(format!(
                    "connection {} -> {}: 'output' and 'input' must be given together",
                    connection.from, connection.to
                )));
            }
        }
    }

    Ok(BuiltPipeline {
        pipeline,
        input_specs,
    })
}

/// Instantiates built-in components by type name.
///
/// One store is shared by every writer and retriever in the graph; remote
/// model clients are created once, on first use.
pub(crate) struct ComponentFactory<'a> {
    config: &'a AppConfig,
    mode: BuildMode,
    store: Arc<InMemoryStore>,
    chat: Option<Arc<dyn ChatModel>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl<'a> ComponentFactory<'a> {
    pub(crate) fn new(config: &'a AppConfig, mode: BuildMode) -> Self {
        Self {
            config,
            mode,
            store: Arc::new(InMemoryStore::new()),
            chat: None,
            embedder: None,
        }
    }

    pub(crate) fn instantiate(
        &mut self,
        kind: &str,
        params: &toml::Table,
    ) -> Result<Arc<dyn Component>> {
        let defaults = &self.config.defaults;
        Ok(match kind {
            "fetcher" => Arc::new(UrlFetcher::new(&self.config.fetch)?),
            "converter" => Arc::new(HtmlConverter::new()),
            "splitter" => Arc::new(DocumentSplitter::new(
                usize_param(params, "window", defaults.split_words)?,
                usize_param(params, "overlap", defaults.split_overlap)?,
            )?),
            "writer" => {
                let mut writer = StoreWriter::new(self.store.clone());
                if bool_param(params, "embed", false)? {
                    writer = writer.with_embedder(self.embedder()?);
                }
                Arc::new(writer)
            }
            "bm25_retriever" => Arc::new(Bm25Retriever::new(
                self.store.clone(),
                usize_param(params, "top_k", defaults.top_k)?,
            )),
            "embedding_retriever" => Arc::new(EmbeddingRetriever::new(
                self.store.clone(),
                self.embedder()?,
                usize_param(params, "top_k", defaults.top_k)?,
            )),
            "extractive_reader" => {
                Arc::new(ExtractiveReader::new(usize_param(params, "top_k", defaults.top_k)?))
            }
            "table_reader" => {
                Arc::new(TableReader::new(usize_param(params, "top_k", defaults.top_k)?))
            }
            "prompt_builder" => {
                let template = match params.get("template") {
                    Some(toml::Value::String(t)) => t.clone(),
                    Some(_) => {
                        return Err(RaglineError::config("param 'template' must be a string"));
                    }
                    None => DEFAULT_TEMPLATE.to_string(),
                };
                Arc::new(PromptBuilder::new(template)?)
            }
            "generator" => Arc::new(Generator::new(self.chat()?)),
            other => {
                return Err(RaglineError::config(format!(
                    "unknown component type '{other}'; known types: {}",
                    COMPONENT_KINDS.join(", ")
                )));
            }
        })
    }

    fn chat(&mut self) -> Result<Arc<dyn ChatModel>> {
        if self.chat.is_none() {
            self.chat = Some(match self.mode {
                BuildMode::Run => Arc::new(ApiChatModel::new(&self.config.model)?),
                BuildMode::ValidateOnly => Arc::new(InertBackend),
            });
        }
        Ok(self.chat.clone().expect("just set"))
    }

    fn embedder(&mut self) -> Result<Arc<dyn Embedder>> {
        if self.embedder.is_none() {
            self.embedder = Some(match self.mode {
                BuildMode::Run => Arc::new(ApiEmbedder::new(&self.config.model)?),
                BuildMode::ValidateOnly => Arc::new(InertBackend),
            });
        }
        Ok(self.embedder.clone().expect("just set"))
    }
}

/// Stand-in backend for validate-only builds; fails if ever invoked.
struct InertBackend;

impl ChatModel for InertBackend {
    fn complete(&self, _prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(async { Err(RaglineError::Model("no chat model backend configured".into())) })
    }
}

impl Embedder for InertBackend {
    fn embed(&self, _texts: Vec<String>) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        Box::pin(async { Err(RaglineError::Model("no embedding backend configured".into())) })
    }
}

fn usize_param(params: &toml::Table, key: &str, default: usize) -> Result<usize> {
    match params.get(key) {
        None => Ok(default),
        Some(toml::Value::Integer(n)) if *n >= 0 => Ok(*n as usize),
        Some(_) => Err(RaglineError::config(format!(
            "param '{key}' must be a non-negative integer"
        ))),
    }
}

fn bool_param(params: &toml::Table, key: &str, default: bool) -> Result<bool> {
    match params.get(key) {
        None => Ok(default),
        Some(toml::Value::Boolean(b)) => Ok(*b),
        Some(_) => Err(RaglineError::config(format!("param '{key}' must be a boolean"))),
    }
}

// ---------------------------------------------------------------------------
// Input overrides
// ---------------------------------------------------------------------------

/// Parse one `--input component.field=value` override, typed against the
/// target component's declared input field.
pub(crate) fn parse_input_override(
    built: &BuiltPipeline,
    raw: &str,
) -> Result<(String, String, Value)> {
    let (target, value) = raw.split_once('=').ok_or_else(|| {
        RaglineError::config(format!("invalid input '{raw}': expected component.field=value"))
    })?;
    let (component, field) = target.split_once('.').ok_or_else(|| {
        RaglineError::config(format!("invalid input '{raw}': expected component.field=value"))
    })?;

    let specs = built.input_specs.get(component).ok_or_else(|| {
        RaglineError::UnknownComponent {
            name: component.to_string(),
        }
    })?;
    let spec = specs.iter().find(|s| s.name == field).ok_or_else(|| {
        RaglineError::config(format!("component '{component}' has no input field '{field}'"))
    })?;

    let parsed = match spec.ty {
        FieldType::Text => Value::Text(value.to_string()),
        FieldType::Urls => {
            let urls = value
                .split([',', ' '])
                .filter(|part| !part.is_empty())
                .map(|part| {
                    Url::parse(part).map_err(|e| {
                        RaglineError::config(format!("invalid URL '{part}': {e}"))
                    })
                })
                .collect::<Result<Vec<Url>>>()?;
            Value::Urls(urls)
        }
        other => {
            return Err(RaglineError::config(format!(
                "input field '{component}.{field}' has type {other}, which cannot be \
                 provided on the command line"
            )));
        }
    };

    Ok((component.to_string(), field.to_string(), parsed))
}
