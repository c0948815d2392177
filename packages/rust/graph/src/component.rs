//! The uniform component contract.
//!
//! A component is a named unit of work with declared input and output
//! fields. The executor relies on nothing else: it hands a component a
//! mapping of named inputs and receives a mapping of named outputs, which
//! lets implementations be swapped (one retriever for another, a stub
//! model for a remote one) without touching the graph.

use futures::future::BoxFuture;

use ragline_shared::{FieldSpec, InputMap, OutputMap, Result};

/// A unit of work wired into a [`Pipeline`](crate::Pipeline).
///
/// Implementations must be cheap to share (`Send + Sync`); per-run state
/// belongs in the input map, not in the component. `invoke` returns a boxed
/// future so the trait stays object-safe.
pub trait Component: Send + Sync {
    /// Declared input fields. Names must be unique.
    fn inputs(&self) -> Vec<FieldSpec>;

    /// Declared output fields. Names must be unique; every declared output
    /// is present in a successful invocation's result.
    fn outputs(&self) -> Vec<FieldSpec>;

    /// Run the component's operation with the assembled inputs.
    ///
    /// The executor guarantees every required input is present and
    /// type-correct before calling this.
    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>>;
}
