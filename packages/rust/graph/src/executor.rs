//! Dependency-order execution of a pipeline for one run request.
//!
//! Components run sequentially in topological order. Inputs are assembled
//! from wired edges first, then run-request overrides on top (override
//! wins). Any failure aborts the run: the executor performs no retries, no
//! skips, and never returns a partially completed result.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info, instrument};

use ragline_shared::{InputMap, OutputMap, RaglineError, Result, Value};

use crate::observer::{RunObserver, SilentObserver};
use crate::registry::Pipeline;

// ---------------------------------------------------------------------------
// RunRequest
// ---------------------------------------------------------------------------

/// Per-invocation input overrides: component name → field → value.
///
/// Overrides seed entry components with external data (a URL list, a query
/// string) and take precedence over wired edges for the fields they name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRequest {
    overrides: BTreeMap<String, InputMap>,
}

impl RunRequest {
    /// An empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style override for one component field.
    pub fn with_input(
        mut self,
        component: impl Into<String>,
        field: impl Into<String>,
        value: Value,
    ) -> Self {
        self.insert(component, field, value);
        self
    }

    /// Add an override for one component field.
    pub fn insert(&mut self, component: impl Into<String>, field: impl Into<String>, value: Value) {
        self.overrides
            .entry(component.into())
            .or_default()
            .insert(field.into(), value);
    }

    /// Overrides declared for a component, if any.
    pub fn inputs_for(&self, component: &str) -> Option<&InputMap> {
        self.overrides.get(component)
    }
}

// ---------------------------------------------------------------------------
// RunResult
// ---------------------------------------------------------------------------

/// Outputs of a completed run: component name → its output map.
///
/// Populated only for components that executed successfully; a failed run
/// returns an error instead, and the partial map is discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunResult {
    outputs: BTreeMap<String, OutputMap>,
}

impl RunResult {
    /// Output map of one component, if it executed.
    pub fn get(&self, component: &str) -> Option<&OutputMap> {
        self.outputs.get(component)
    }

    /// One output field of one component.
    pub fn field(&self, component: &str, field: &str) -> Option<&Value> {
        self.outputs.get(component).and_then(|m| m.get(field))
    }

    /// True if the component produced output in this run.
    pub fn contains(&self, component: &str) -> bool {
        self.outputs.contains_key(component)
    }

    /// Number of executed components.
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    /// True when no component executed.
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Iterate executed components in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OutputMap)> {
        self.outputs.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn record(&mut self, component: String, outputs: OutputMap) {
        self.outputs.insert(component, outputs);
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

impl Pipeline {
    /// Run the pipeline with no progress reporting.
    pub async fn run(&self, request: &RunRequest) -> Result<RunResult> {
        self.run_with_observer(request, &SilentObserver).await
    }

    /// Run every component in dependency order for one request.
    ///
    /// Validates first, so a structurally unsatisfiable run fails before any
    /// component executes. No component runs more than once.
    #[instrument(skip_all, fields(components = self.nodes.len(), edges = self.edges.len()))]
    pub async fn run_with_observer(
        &self,
        request: &RunRequest,
        observer: &dyn RunObserver,
    ) -> Result<RunResult> {
        self.validate(request)?;
        let order = self.topological_order()?;
        let total = order.len();
        let started = Instant::now();

        info!(components = total, "starting pipeline run");

        let mut result = RunResult::default();

        for (position, &idx) in order.iter().enumerate() {
            let node = &self.nodes[idx];
            let inputs = self.assemble_inputs(idx, request, &result)?;

            observer.component_started(&node.name, position, total);
            debug!(
                component = %node.name,
                inputs = inputs.len(),
                "invoking component"
            );

            let component_started = Instant::now();
            let outputs = node
                .component
                .invoke(inputs)
                .await
                .map_err(|e| RaglineError::component_failed(&node.name, e))?;

            let elapsed = component_started.elapsed();
            observer.component_finished(&node.name, elapsed);
            debug!(
                component = %node.name,
                outputs = outputs.len(),
                elapsed_ms = elapsed.as_millis(),
                "component complete"
            );

            result.record(node.name.clone(), outputs);
        }

        info!(
            components = result.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "pipeline run complete"
        );
        observer.run_finished(&result);

        Ok(result)
    }

    /// Gather one component's inputs: wired edge values first, then
    /// run-request overrides on top. Missing required fields are fatal.
    fn assemble_inputs(
        &self,
        idx: usize,
        request: &RunRequest,
        result: &RunResult,
    ) -> Result<InputMap> {
        let node = &self.nodes[idx];
        let mut inputs = InputMap::new();

        for edge in self.edges.iter().filter(|e| e.consumer == idx) {
            let producer = &self.nodes[edge.producer].name;
            // Producers precede consumers in topological order, so a wired
            // value can only be absent if the producer omitted the field.
            if let Some(value) = result.field(producer, &edge.output) {
                inputs.insert(edge.input.clone(), value.clone());
            }
        }

        if let Some(overrides) = request.inputs_for(&node.name) {
            for (field, value) in overrides {
                inputs.insert(field.clone(), value.clone());
            }
        }

        for spec in node.component.inputs() {
            if spec.required && !inputs.contains_key(&spec.name) {
                return Err(RaglineError::MissingInput {
                    component: node.name.clone(),
                    field: spec.name,
                });
            }
        }

        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{concat, fail, recorder, silent_source, source, upper, RunLog};
    use ragline_shared::Value;

    fn text(result: &RunResult, component: &str, field: &str) -> String {
        result
            .field(component, field)
            .and_then(Value::as_text)
            .expect("text field")
            .to_string()
    }

    #[tokio::test]
    async fn linear_chain_runs_in_dependency_order() {
        let log = RunLog::default();
        let mut pipeline = Pipeline::new();
        pipeline.add_component("a", recorder("a", &log)).unwrap();
        pipeline.add_component("b", recorder("b", &log)).unwrap();
        pipeline.add_component("c", recorder("c", &log)).unwrap();
        pipeline.connect("a", "b").unwrap();
        pipeline.connect("b", "c").unwrap();

        let request = RunRequest::new().with_input("a", "text", Value::Text("x".into()));
        let result = pipeline.run(&request).await.unwrap();

        assert!(result.contains("a") && result.contains("b") && result.contains("c"));
        assert_eq!(log.entries(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn outputs_thread_through_edges() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("src", source("hello")).unwrap();
        pipeline.add_component("up", upper()).unwrap();
        pipeline.connect("src", "up").unwrap();

        let result = pipeline.run(&RunRequest::new()).await.unwrap();
        assert_eq!(text(&result, "up", "text"), "HELLO");
    }

    #[tokio::test]
    async fn override_wins_over_wired_edge() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("src", source("wired")).unwrap();
        pipeline.add_component("up", upper()).unwrap();
        pipeline.connect("src", "up").unwrap();

        let request = RunRequest::new().with_input("up", "text", Value::Text("override".into()));
        let result = pipeline.run(&request).await.unwrap();
        assert_eq!(text(&result, "up", "text"), "OVERRIDE");
    }

    #[tokio::test]
    async fn failure_aborts_run_and_names_component() {
        let log = RunLog::default();
        let mut pipeline = Pipeline::new();
        pipeline.add_component("a", source("x")).unwrap();
        pipeline.add_component("b", fail("network down")).unwrap();
        pipeline.add_component("c", recorder("c", &log)).unwrap();
        pipeline.connect("a", "b").unwrap();
        pipeline.connect("b", "c").unwrap();

        let err = pipeline.run(&RunRequest::new()).await.unwrap_err();
        let RaglineError::ComponentFailed { component, source } = err else {
            panic!("expected ComponentFailed, got {err}");
        };
        assert_eq!(component, "b");
        assert!(source.to_string().contains("network down"));

        // c never executed — no partial result escapes either.
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn rerun_is_field_for_field_identical() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("src", source("same")).unwrap();
        pipeline.add_component("up", upper()).unwrap();
        pipeline.connect("src", "up").unwrap();

        let request = RunRequest::new();
        let first = pipeline.run(&request).await.unwrap();
        let second = pipeline.run(&request).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn fan_in_waits_for_both_producers() {
        let log = RunLog::default();
        let mut pipeline = Pipeline::new();
        pipeline.add_component("join", concat()).unwrap();
        pipeline.add_component("left", recorder("left", &log)).unwrap();
        pipeline.add_component("right", recorder("right", &log)).unwrap();
        pipeline.connect_fields("left", "text", "join", "left").unwrap();
        pipeline.connect_fields("right", "text", "join", "right").unwrap();

        let request = RunRequest::new()
            .with_input("left", "text", Value::Text("l".into()))
            .with_input("right", "text", Value::Text("r".into()));
        let result = pipeline.run(&request).await.unwrap();

        assert_eq!(text(&result, "join", "text"), "l+r");
        // Despite being registered first, join runs after both producers.
        assert_eq!(log.entries(), vec!["left", "right"]);
    }

    #[tokio::test]
    async fn fan_out_copies_producer_output_to_all_consumers() {
        let mut pipeline = Pipeline::new();
        pipeline.add_component("src", source("fan")).unwrap();
        pipeline.add_component("up1", upper()).unwrap();
        pipeline.add_component("up2", upper()).unwrap();
        pipeline.connect("src", "up1").unwrap();
        pipeline.connect("src", "up2").unwrap();

        let result = pipeline.run(&RunRequest::new()).await.unwrap();
        assert_eq!(text(&result, "up1", "text"), "FAN");
        assert_eq!(text(&result, "up2", "text"), "FAN");
    }

    #[tokio::test]
    async fn producer_omitting_a_wired_output_is_a_missing_input() {
        let log = RunLog::default();
        let mut pipeline = Pipeline::new();
        pipeline.add_component("src", silent_source()).unwrap();
        pipeline.add_component("rec", recorder("rec", &log)).unwrap();
        pipeline.connect("src", "rec").unwrap();

        // The graph validates: the edge satisfies rec's required input on
        // paper. Only at run time does src fail to deliver the field.
        let err = pipeline.run(&RunRequest::new()).await.unwrap_err();
        let RaglineError::MissingInput { component, field } = err else {
            panic!("expected MissingInput, got {err}");
        };
        assert_eq!(component, "rec");
        assert_eq!(field, "text");
        assert!(log.entries().is_empty(), "the consumer must not execute");
    }

    #[tokio::test]
    async fn unsatisfied_required_input_fails_before_execution() {
        let log = RunLog::default();
        let mut pipeline = Pipeline::new();
        pipeline.add_component("rec", recorder("rec", &log)).unwrap();

        let err = pipeline.run(&RunRequest::new()).await.unwrap_err();
        assert!(matches!(err, RaglineError::DanglingInput { .. }));
        assert!(log.entries().is_empty(), "nothing may run in an invalid graph");
    }

    #[tokio::test]
    async fn observer_sees_every_component() {
        use std::sync::Mutex;
        use std::time::Duration;

        #[derive(Default)]
        struct Counting {
            started: Mutex<Vec<String>>,
            finished: Mutex<usize>,
        }

        impl RunObserver for Counting {
            fn component_started(&self, name: &str, _index: usize, _total: usize) {
                self.started.lock().unwrap().push(name.to_string());
            }
            fn component_finished(&self, _name: &str, _elapsed: Duration) {
                *self.finished.lock().unwrap() += 1;
            }
        }

        let mut pipeline = Pipeline::new();
        pipeline.add_component("src", source("x")).unwrap();
        pipeline.add_component("up", upper()).unwrap();
        pipeline.connect("src", "up").unwrap();

        let observer = Counting::default();
        pipeline
            .run_with_observer(&RunRequest::new(), &observer)
            .await
            .unwrap();

        assert_eq!(*observer.started.lock().unwrap(), vec!["src", "up"]);
        assert_eq!(*observer.finished.lock().unwrap(), 2);
    }
}
