//! The tagged value model carried along pipeline edges.
//!
//! Components declare their fields as [`FieldSpec`]s; the graph checks edge
//! compatibility against the declared [`FieldType`]s at construction time,
//! so field mismatches never survive to a run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::types::{Answer, Document, Page};

// ---------------------------------------------------------------------------
// FieldType
// ---------------------------------------------------------------------------

/// The closed set of semantic types a pipeline field can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// A list of URLs to fetch.
    Urls,
    /// Raw fetched page contents.
    Pages,
    /// A set of documents.
    Documents,
    /// A single string: query, prompt, or reply.
    Text,
    /// Extracted answers with scores and offsets.
    Answers,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Urls => "urls",
            Self::Pages => "pages",
            Self::Documents => "documents",
            Self::Text => "text",
            Self::Answers => "answers",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A payload flowing between components, tagged with its [`FieldType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Urls(Vec<Url>),
    Pages(Vec<Page>),
    Documents(Vec<Document>),
    Text(String),
    Answers(Vec<Answer>),
}

impl Value {
    /// The field type this value satisfies.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Urls(_) => FieldType::Urls,
            Self::Pages(_) => FieldType::Pages,
            Self::Documents(_) => FieldType::Documents,
            Self::Text(_) => FieldType::Text,
            Self::Answers(_) => FieldType::Answers,
        }
    }

    /// Borrow as documents, if this is a `Documents` value.
    pub fn as_documents(&self) -> Option<&[Document]> {
        match self {
            Self::Documents(docs) => Some(docs),
            _ => None,
        }
    }

    /// Borrow as text, if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as pages, if this is a `Pages` value.
    pub fn as_pages(&self) -> Option<&[Page]> {
        match self {
            Self::Pages(pages) => Some(pages),
            _ => None,
        }
    }

    /// Borrow as URLs, if this is a `Urls` value.
    pub fn as_urls(&self) -> Option<&[Url]> {
        match self {
            Self::Urls(urls) => Some(urls),
            _ => None,
        }
    }

    /// Borrow as answers, if this is an `Answers` value.
    pub fn as_answers(&self) -> Option<&[Answer]> {
        match self {
            Self::Answers(answers) => Some(answers),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

/// A declared input or output field of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, unique within the component's inputs (or outputs).
    pub name: String,
    /// Semantic type of the payload.
    pub ty: FieldType,
    /// Whether a run must supply this field (inputs only; outputs are
    /// always produced).
    pub required: bool,
}

impl FieldSpec {
    /// A required field.
    pub fn required(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
        }
    }

    /// An optional field.
    pub fn optional(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
        }
    }
}

/// Named inputs handed to a component invocation.
///
/// Ordered map so assembled inputs (and therefore logs and errors) are
/// deterministic.
pub type InputMap = BTreeMap<String, Value>;

/// Named outputs produced by a component invocation.
pub type OutputMap = BTreeMap<String, Value>;
