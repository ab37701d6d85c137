//! Completion client trait definition

use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use super::error::ClientResult;
use crate::types::{CancellationToken, ChatMessage, PerplexityModel};

/// A chat-completion request
///
/// The key travels with the request because it is read fresh from the secret
/// store for every query.
#[derive(Clone)]
pub struct CompletionRequest {
    pub model: PerplexityModel,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub api_key: String,
    /// Overrides the client-wide timeout for this request
    pub timeout: Option<Duration>,
}

impl CompletionRequest {
    pub fn new(model: PerplexityModel, messages: Vec<ChatMessage>, api_key: impl Into<String>) -> Self {
        Self {
            model,
            messages,
            max_tokens: None,
            api_key: api_key.into(),
            timeout: None,
        }
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl std::fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("model", &self.model)
            .field("messages", &self.messages)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("api_key", &crate::logging::describe_key(Some(self.api_key.as_str())))
            .finish()
    }
}

/// Outcome of a credential check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTestResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionTestResult {
    pub fn success(latency_ms: u64) -> Self {
        Self {
            ok: true,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Incremental text fragments of a streamed completion
///
/// Ends with `Err(ClientError::Cancelled)` when the request's token fires.
pub type TextStream = Pin<Box<dyn Stream<Item = ClientResult<String>> + Send>>;

/// Chat-completion backend
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Non-streaming completion; returns the first choice's full text
    async fn complete(&self, request: CompletionRequest, cancel: CancellationToken) -> ClientResult<String>;

    /// Streaming completion; fragments are yielded as they arrive
    async fn stream(&self, request: CompletionRequest, cancel: CancellationToken) -> ClientResult<TextStream>;

    /// Minimal round trip used by the settings panel to validate a key
    async fn test_connection(&self, model: PerplexityModel, api_key: &str) -> ConnectionTestResult {
        let request = CompletionRequest::new(model, vec![ChatMessage::user("Hello!")], api_key)
            .with_max_tokens(5);
        let started = Instant::now();
        let result = self.complete(request, CancellationToken::new()).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(_) => ConnectionTestResult::success(latency_ms),
            Err(e) => ConnectionTestResult::failure(e.to_string()).with_latency(latency_ms),
        }
    }
}
