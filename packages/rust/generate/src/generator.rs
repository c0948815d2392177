//! Generator component.

use std::sync::Arc;

use futures::future::BoxFuture;

use ragline_graph::Component;
use ragline_shared::{FieldSpec, FieldType, InputMap, OutputMap, RaglineError, Result, Value};

use crate::client::ChatModel;

/// Completes a rendered prompt through a chat model.
///
/// Inputs: `prompt: Text` (required). Outputs: `replies: Text`. Backend
/// failures (HTTP, decoding, missing choices) surface as component errors.
pub struct Generator {
    model: Arc<dyn ChatModel>,
}

impl Generator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

impl Component for Generator {
    fn inputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("prompt", FieldType::Text)]
    }

    fn outputs(&self) -> Vec<FieldSpec> {
        vec![FieldSpec::required("replies", FieldType::Text)]
    }

    fn invoke(&self, inputs: InputMap) -> BoxFuture<'_, Result<OutputMap>> {
        Box::pin(async move {
            let prompt = inputs
                .get("prompt")
                .and_then(Value::as_text)
                .ok_or_else(|| RaglineError::validation("generator input 'prompt' is not text"))?
                .to_string();

            let reply = self.model.complete(prompt).await?;

            let mut out = OutputMap::new();
            out.insert("replies".into(), Value::Text(reply));
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes the prompt back, prefixed.
    struct EchoModel;

    impl ChatModel for EchoModel {
        fn complete(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
            Box::pin(async move { Ok(format!("echo: {prompt}")) })
        }
    }

    struct FailingModel;

    impl ChatModel for FailingModel {
        fn complete(&self, _prompt: String) -> BoxFuture<'_, Result<String>> {
            Box::pin(async { Err(RaglineError::Model("backend down".into())) })
        }
    }

    #[tokio::test]
    async fn completes_the_prompt() {
        let generator = Generator::new(Arc::new(EchoModel));
        let mut inputs = InputMap::new();
        inputs.insert("prompt".into(), Value::Text("ping".into()));

        let out = generator.invoke(inputs).await.unwrap();
        assert_eq!(
            out.get("replies").and_then(Value::as_text),
            Some("echo: ping")
        );
    }

    #[tokio::test]
    async fn backend_failure_is_a_component_error() {
        let generator = Generator::new(Arc::new(FailingModel));
        let mut inputs = InputMap::new();
        inputs.insert("prompt".into(), Value::Text("ping".into()));

        let err = generator.invoke(inputs).await.unwrap_err();
        assert!(err.to_string().contains("backend down"));
    }
}
