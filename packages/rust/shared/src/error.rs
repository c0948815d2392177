//! Error types for ragline.
//!
//! Library crates use [`RaglineError`] via `thiserror`.
//! App crates (cli) wrap this with `color-eyre` for rich diagnostics.
//!
//! Structural errors (duplicate name, unknown component, type mismatch,
//! cycle, dangling input) are raised at graph-construction/validation time
//! and leave the graph unchanged. Runtime errors (missing input, component
//! failure) abort the whole run — the executor never returns partial results.

use std::path::PathBuf;

use crate::value::FieldType;

/// Top-level error type for all ragline operations.
#[derive(Debug, thiserror::Error)]
pub enum RaglineError {
    /// A component with this name is already registered in the graph.
    #[error("component '{name}' is already registered")]
    DuplicateComponent { name: String },

    /// An edge or lookup referenced a component name not present in the graph.
    #[error("unknown component '{name}'")]
    UnknownComponent { name: String },

    /// A producer output field and consumer input field have incompatible types.
    #[error(
        "type mismatch on edge {producer}.{output} -> {consumer}.{input}: \
         producer yields {found}, consumer expects {expected}"
    )]
    TypeMismatch {
        producer: String,
        output: String,
        consumer: String,
        input: String,
        expected: FieldType,
        found: FieldType,
    },

    /// Adding this edge would make a component (transitively) depend on its own output.
    #[error("edge {producer} -> {consumer} would create a cycle")]
    Cycle { producer: String, consumer: String },

    /// A required input field is supplied by neither an edge nor a run-request override.
    #[error("input '{component}.{field}' is satisfied by no edge and no run-request override")]
    DanglingInput { component: String, field: String },

    /// A required input had no value at execution time.
    #[error("no value available for required input '{component}.{field}'")]
    MissingInput { component: String, field: String },

    /// A component's own operation failed; the run is aborted.
    #[error("component '{component}' failed")]
    ComponentFailed {
        component: String,
        #[source]
        source: Box<RaglineError>,
    },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during fetch or a remote model call.
    #[error("network error: {0}")]
    Network(String),

    /// HTML parsing or content extraction error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Remote model (chat completion / embedding) error.
    #[error("model error: {0}")]
    Model(String),

    /// Search index error from the retrieval layer.
    #[error("index error: {0}")]
    Index(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad template, invalid pipeline definition, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RaglineError>;

impl RaglineError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a component's own failure, naming the component.
    pub fn component_failed(component: impl Into<String>, source: RaglineError) -> Self {
        Self::ComponentFailed {
            component: component.into(),
            source: Box::new(source),
        }
    }

    /// True for errors raised at graph-construction/validation time.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateComponent { .. }
                | Self::UnknownComponent { .. }
                | Self::TypeMismatch { .. }
                | Self::Cycle { .. }
                | Self::DanglingInput { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = RaglineError::DuplicateComponent {
            name: "fetcher".into(),
        };
        assert_eq!(err.to_string(), "component 'fetcher' is already registered");

        let err = RaglineError::MissingInput {
            component: "prompt_builder".into(),
            field: "query".into(),
        };
        assert!(err.to_string().contains("prompt_builder.query"));
    }

    #[test]
    fn component_failure_carries_cause() {
        let err = RaglineError::component_failed(
            "fetcher",
            RaglineError::Network("connection refused".into()),
        );
        assert!(err.to_string().contains("fetcher"));

        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("connection refused"));
    }

    #[test]
    fn structural_classification() {
        let structural = RaglineError::Cycle {
            producer: "a".into(),
            consumer: "b".into(),
        };
        assert!(structural.is_structural());

        let runtime = RaglineError::MissingInput {
            component: "a".into(),
            field: "urls".into(),
        };
        assert!(!runtime.is_structural());
    }
}
