//! Stub components shared by the registry and executor tests.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use ragline_shared::{FieldSpec, FieldType, InputMap, OutputMap, RaglineError, Result, Value};

use crate::component::Component;

/// Ordered record of which components executed.
#[derive(Debug, Clone, Default)]
pub struct RunLog(Arc<Mutex<Vec<String>>>);

impl RunLog {
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, name: &str) {
        self.0.lock().unwrap().push(name.to_string());
    }
}

/// No inputs; emits a fixed `text` output.
struct Source(String);

impl Component for Source {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("text", FieldType::Text)]
    }

    fn invoke(&self, _inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let mut out = OutputMap::new();
            out.insert("text".into(), Value::Text(self.0.clone()));
            Ok(out)
        })
    }
}

/// Requires `text`; emits it uppercased.
struct Upper;

impl Component for Upper {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("text", FieldType::Text)]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("text", FieldType::Text)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let text = inputs
                .get("text")
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_uppercase();
            let mut out = OutputMap::new();
            out.insert("text".into(), Value::Text(text));
            Ok(out)
        })
    }
}

/// Fan-in: requires `left` and `right`, emits `left+right`.
struct Concat;

impl Component for Concat {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![
            FieldSpec::required("left", FieldType::Text),
            FieldSpec::required("right", FieldType::Text),
        ]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("text", FieldType::Text)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let left = inputs.get("left").and_then(Value::as_text).unwrap_or_default();
            let right = inputs.get("right").and_then(Value::as_text).unwrap_or_default();
            let mut out = OutputMap::new();
            out.insert("text".into(), Value::Text(format!("{left}+{right}")));
            Ok(out)
        })
    }
}

/// Always fails with a network error.
struct Fail(String);

impl Component for Fail {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::optional("text", FieldType::Text)]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("text", FieldType::Text)]
    }

    fn invoke(&self, _inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move { Err(RaglineError::Network(self.0.clone())) })
    }
}

/// Declares a `text` output but never emits it.
struct SilentSource;

impl Component for SilentSource {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("text", FieldType::Text)]
    }

    fn invoke(&self, _inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move { Ok(OutputMap::new()) })
    }
}

/// Text pass-through that records its execution in a [`RunLog`].
struct Recorder {
    name: String,
    log: RunLog,
}

impl Component for Recorder {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("text", FieldType::Text)]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("text", FieldType::Text)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            self.log.push(&self.name);
            let text = inputs
                .get("text")
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_string();
            let mut out = OutputMap::new();
            out.insert("text".into(), Value::Text(text));
            Ok(out)
        })
    }
}

/// Consumes `documents`; useful for type-mismatch tests.
struct DocumentSink;

impl Component for DocumentSink {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("documents", FieldType::Documents)]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("documents", FieldType::Documents)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let docs = inputs
                .get("documents")
                .cloned()
                .unwrap_or(Value::Documents(vec![]));
            let mut out = OutputMap::new();
            out.insert("documents".into(), docs);
            Ok(out)
        })
    }
}

pub fn source(text: &str) -> Arc<dyn Component> {
    Arc::new(Source(text.to_string()))
}

pub fn upper() -> Arc<dyn Component> {
    Arc::new(Upper)
}

pub fn concat() -> Arc<dyn Component> {
    Arc::new(Concat)
}

pub fn fail(message: &str) -> Arc<dyn Component> {
    Arc::new(Fail(message.to_string()))
}

pub fn silent_source() -> Arc<dyn Component> {
    Arc::new(SilentSource)
}

pub fn recorder(name: &str, log: &RunLog) -> Arc<dyn Component> {
    Arc::new(Recorder {
        name: name.to_string(),
        log: log.clone(),
    })
}

pub fn document_sink() -> Arc<dyn Component> {
    Arc::new(DocumentSink)
}
