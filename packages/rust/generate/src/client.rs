//! Chat-completion backends.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ragline_shared::{ModelConfig, RaglineError, Result};

/// Completes a prompt into a reply. Object-safe so the generator component
/// can be tested with a stub backend.
pub trait ChatModel: Send + Sync {
    fn complete(&self, prompt: String) -> BoxFuture<'_, Result<String>>;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat-completions client
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Non-streaming client for the OpenAI-compatible `/chat/completions` API.
pub struct ApiChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ApiChatModel {
    /// Create a client, reading the API key from the env var named in config.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RaglineError::config(format!(
                "model API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;
        Ok(Self::with_api_key(config, api_key))
    }

    /// Create a client with an explicit API key (used by tests).
    pub fn with_api_key(config: &ModelConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        }
    }

    async fn request_completion(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RaglineError::Model(format!("chat request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RaglineError::Model(format!(
                "chat request failed with HTTP {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RaglineError::Model(format!("invalid chat response: {e}")))?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| RaglineError::Model("chat response has no choices".into()))?;

        debug!(model = %self.model, reply_len = reply.len(), "completion received");
        Ok(reply)
    }
}

impl ChatModel for ApiChatModel {
    fn complete(&self, prompt: String) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.request_completion(prompt))
    }
}
