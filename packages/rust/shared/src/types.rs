//! Core domain types flowing through ragline pipelines.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for document identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Generate a new time-sortable document identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Deterministic identifier derived from content parts.
    ///
    /// Converters and splitters use this so processing the same source twice
    /// yields identical documents, keeping pipeline reruns reproducible.
    pub fn derived(parts: &[&str]) -> Self {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// Raw content fetched from a single URL, before conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// The URL the content was fetched from.
    pub url: String,
    /// Raw response body.
    pub body: Vec<u8>,
    /// Media type from the `Content-Type` header, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// HTTP status code.
    pub status: u16,
}

impl Page {
    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A structured table extracted from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column headers.
    pub headers: Vec<String>,
    /// Data rows; every row has `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Row-major linearized cell sequence (headers excluded).
    ///
    /// Answer cell offsets index into this sequence.
    pub fn linearize(&self) -> Vec<&str> {
        self.rows
            .iter()
            .flat_map(|row| row.iter().map(String::as_str))
            .collect()
    }

    /// Number of data cells in the linearized sequence.
    pub fn cell_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A unit of retrievable content: converted page text, a chunk of it,
/// or a structured table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier.
    pub id: DocumentId,
    /// Text content (empty for pure table documents).
    pub content: String,
    /// Title, extracted or inherited from the source page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Original source URL for traceability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Structured table payload, when this document represents a table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,
    /// Dense embedding, populated by the store's embedding update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Free-form metadata (chunk provenance, scores, etc.).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Create a text document with a fresh id.
    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            content: content.into(),
            title: None,
            source_url: None,
            table: None,
            embedding: None,
            meta: serde_json::Map::new(),
        }
    }

    /// Create a table document with a fresh id.
    pub fn from_table(table: Table) -> Self {
        Self {
            id: DocumentId::new(),
            content: String::new(),
            title: None,
            source_url: None,
            table: Some(table),
            embedding: None,
            meta: serde_json::Map::new(),
        }
    }

    /// Builder-style title setter.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Builder-style source URL setter.
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Answer
// ---------------------------------------------------------------------------

/// Aggregation operator applied by a table reader across matched cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Count,
}

/// An answer located within (or aggregated over) a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text.
    pub text: String,
    /// Confidence score in `[0, 1]`, higher is better.
    pub score: f32,
    /// The document the answer was extracted from.
    pub document_id: DocumentId,
    /// Char offset range of the span within the document content, for
    /// extractive answers over plain text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<(usize, usize)>,
    /// Offsets into the table's linearized cell sequence, for tabular answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<usize>>,
    /// Aggregation operator, when the answer is computed rather than located.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
}
