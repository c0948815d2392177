//! Shared types, error model, and configuration for ragline.
//!
//! This crate is the foundation depended on by all other ragline crates.
//! It provides:
//! - [`RaglineError`] — the unified error type
//! - Domain types ([`Document`], [`Page`], [`Answer`], [`Table`])
//! - The pipeline value model ([`Value`], [`FieldType`], [`FieldSpec`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;
pub mod value;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, FetchConfig, ModelConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{RaglineError, Result};
pub use types::{Aggregation, Answer, Document, DocumentId, Page, Table};
pub use value::{FieldSpec, FieldType, InputMap, OutputMap, Value};
