//! Typed component-graph model and DAG executor for ragline.
//!
//! A [`Pipeline`] is a registry of named [`Component`]s plus declared edges
//! between their typed fields. Structural problems (duplicate names, type
//! mismatches, cycles, unsatisfiable inputs) are rejected at construction
//! or validation time; execution walks the DAG in deterministic topological
//! order, threading each producer's outputs to its declared consumers.

pub mod component;
pub mod executor;
pub mod observer;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use component::Component;
pub use executor::{RunRequest, RunResult};
pub use observer::{RunObserver, SilentObserver};
pub use registry::Pipeline;
