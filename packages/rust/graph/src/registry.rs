//! Graph registry: named components plus declared edges, validated at
//! construction time.
//!
//! All structural checks (duplicate names, unknown components, field type
//! mismatches, cycles) happen in the mutating call that would introduce the
//! problem, and a failed call leaves the graph unchanged — an invalid graph
//! can never reach the executor.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use ragline_shared::{FieldSpec, RaglineError, Result};

use crate::component::Component;
use crate::executor::RunRequest;

/// A registered component with its graph-unique name.
pub(crate) struct Node {
    pub(crate) name: String,
    pub(crate) component: Arc<dyn Component>,
}

/// A directed data-flow edge: producer output field → consumer input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edge {
    pub(crate) producer: usize,
    pub(crate) consumer: usize,
    pub(crate) output: String,
    pub(crate) input: String,
}

/// A directed acyclic graph of named components.
///
/// Components and edges are added once at setup time; a graph instance is
/// then run any number of times with per-run input overrides.
#[derive(Default)]
pub struct Pipeline {
    /// Insertion-ordered, so the executor's tie-break is deterministic.
    pub(crate) nodes: Vec<Node>,
    index: HashMap<String, usize>,
    pub(crate) edges: Vec<Edge>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "nodes",
                &self.nodes.iter().map(|n| &n.name).collect::<Vec<_>>(),
            )
            .field("edges", &self.edges)
            .finish()
    }
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no components are registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Component names in insertion order.
    pub fn component_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }

    /// Register a component under a graph-unique name.
    pub fn add_component(
        &mut self,
        name: impl Into<String>,
        component: Arc<dyn Component>,
    ) -> Result<()> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(RaglineError::DuplicateComponent { name });
        }

        debug!(component = %name, "registering component");
        self.index.insert(name.clone(), self.nodes.len());
        self.nodes.push(Node { name, component });
        Ok(())
    }

    /// Declare an edge, inferring the field pair.
    ///
    /// The producer must declare exactly one output; the consumer input is
    /// matched by name, else by unique type. Ambiguity is an error — edges
    /// are always explicit, never guessed.
    pub fn connect(&mut self, producer: &str, consumer: &str) -> Result<()> {
        let p_idx = self.lookup(producer)?;
        let c_idx = self.lookup(consumer)?;

        let outputs = self.nodes[p_idx].component.outputs();
        let output = match outputs.as_slice() {
            [only] => only.clone(),
            _ => {
                return Err(RaglineError::validation(format!(
                    "component '{producer}' declares {} output fields; \
                     use connect_fields to name one",
                    outputs.len()
                )));
            }
        };

        let inputs = self.nodes[c_idx].component.inputs();
        let input = match inputs.iter().find(|spec| spec.name == output.name) {
            Some(spec) => spec.clone(),
            None => {
                let by_type: Vec<&FieldSpec> =
                    inputs.iter().filter(|spec| spec.ty == output.ty).collect();
                match by_type.as_slice() {
                    [only] => (*only).clone(),
                    [] => {
                        return Err(RaglineError::validation(format!(
                            "component '{consumer}' has no input accepting {}",
                            output.ty
                        )));
                    }
                    _ => {
                        return Err(RaglineError::validation(format!(
                            "component '{consumer}' has multiple inputs accepting {}; \
                             use connect_fields to name one",
                            output.ty
                        )));
                    }
                }
            }
        };

        self.insert_edge(p_idx, c_idx, &output, &input)
    }

    /// Declare an edge with explicitly named fields.
    pub fn connect_fields(
        &mut self,
        producer: &str,
        output_field: &str,
        consumer: &str,
        input_field: &str,
    ) -> Result<()> {
        let p_idx = self.lookup(producer)?;
        let c_idx = self.lookup(consumer)?;

        let output = self.nodes[p_idx]
            .component
            .outputs()
            .into_iter()
            .find(|spec| spec.name == output_field)
            .ok_or_else(|| {
                RaglineError::validation(format!(
                    "component '{producer}' has no output field '{output_field}'"
                ))
            })?;

        let input = self.nodes[c_idx]
            .component
            .inputs()
            .into_iter()
            .find(|spec| spec.name == input_field)
            .ok_or_else(|| {
                RaglineError::validation(format!(
                    "component '{consumer}' has no input field '{input_field}'"
                ))
            })?;

        self.insert_edge(p_idx, c_idx, &output, &input)
    }

    /// Remove every edge between a producer/consumer pair.
    pub fn disconnect(&mut self, producer: &str, consumer: &str) -> Result<()> {
        let p_idx = self.lookup(producer)?;
        let c_idx = self.lookup(consumer)?;

        let before = self.edges.len();
        self.edges
            .retain(|e| !(e.producer == p_idx && e.consumer == c_idx));

        if self.edges.len() == before {
            return Err(RaglineError::validation(format!(
                "no edge from '{producer}' to '{consumer}'"
            )));
        }

        debug!(producer, consumer, "edge removed");
        Ok(())
    }

    /// Validate the graph against a run request.
    ///
    /// Checks that the edge set is acyclic, then that every required input
    /// of every component is supplied by an edge or by an override in the
    /// request. A graph that passes is guaranteed not to abort with
    /// `MissingInput`.
    pub fn validate(&self, request: &RunRequest) -> Result<()> {
        self.topological_order()?;

        for (idx, node) in self.nodes.iter().enumerate() {
            for spec in node.component.inputs() {
                if !spec.required {
                    continue;
                }
                let wired = self
                    .edges
                    .iter()
                    .any(|e| e.consumer == idx && e.input == spec.name);
                let overridden = request
                    .inputs_for(&node.name)
                    .is_some_and(|m| m.contains_key(&spec.name));
                if !wired && !overridden {
                    return Err(RaglineError::DanglingInput {
                        component: node.name.clone(),
                        field: spec.name,
                    });
                }
            }
        }

        Ok(())
    }

    // -- internals ----------------------------------------------------------

    fn lookup(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| RaglineError::UnknownComponent { name: name.into() })
    }

    /// All checks precede the push, so a rejected edge never mutates the graph.
    fn insert_edge(
        &mut self,
        p_idx: usize,
        c_idx: usize,
        output: &FieldSpec,
        input: &FieldSpec,
    ) -> Result<()> {
        let producer = self.nodes[p_idx].name.clone();
        let consumer = self.nodes[c_idx].name.clone();

        if output.ty != input.ty {
            return Err(RaglineError::TypeMismatch {
                producer,
                output: output.name.clone(),
                consumer,
                input: input.name.clone(),
                expected: input.ty,
                found: output.ty,
            });
        }

        // One producer per input field: a second edge into the same input
        // would make the assembled value depend on edge insertion order.
        if let Some(existing) = self
            .edges
            .iter()
            .find(|e| e.consumer == c_idx && e.input == input.name)
        {
            return Err(RaglineError::validation(format!(
                "input '{consumer}.{}' is already fed by '{}'",
                input.name, self.nodes[existing.producer].name
            )));
        }

        if p_idx == c_idx || self.reaches(c_idx, p_idx) {
            return Err(RaglineError::Cycle { producer, consumer });
        }

        debug!(
            producer = %self.nodes[p_idx].name,
            output = %output.name,
            consumer = %self.nodes[c_idx].name,
            input = %input.name,
            "edge added"
        );
        self.edges.push(Edge {
            producer: p_idx,
            consumer: c_idx,
            output: output.name.clone(),
            input: input.name.clone(),
        });
        Ok(())
    }

    /// Is `to` reachable from `from` along existing edges?
    fn reaches(&self, from: usize, to: usize) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if seen[node] {
                continue;
            }
            seen[node] = true;
            stack.extend(
                self.edges
                    .iter()
                    .filter(|e| e.producer == node)
                    .map(|e| e.consumer),
            );
        }
        false
    }

    /// Topological order with insertion-order tie-break among ready nodes,
    /// so runs over parallelizable branches are deterministic.
    pub(crate) fn topological_order(&self) -> Result<Vec<usize>> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        for edge in &self.edges {
            indegree[edge.consumer] += 1;
        }

        let mut done = vec![false; n];
        let mut order = Vec::with_capacity(n);

        while order.len() < n {
            let Some(next) = (0..n).find(|&i| !done[i] && indegree[i] == 0) else {
                // Every remaining node has a remaining dependency: report an
                // edge inside the cycle.
                let edge = self
                    .edges
                    .iter()
                    .find(|e| !done[e.producer] && !done[e.consumer])
                    .expect("cyclic remainder must contain an edge");
                return Err(RaglineError::Cycle {
                    producer: self.nodes[edge.producer].name.clone(),
                    consumer: self.nodes[edge.consumer].name.clone(),
                });
            };

            done[next] = true;
            order.push(next);
            for edge in self.edges.iter().filter(|e| e.producer == next) {
                indegree[edge.consumer] -= 1;
            }
        }

        Ok(order)
    }
}
