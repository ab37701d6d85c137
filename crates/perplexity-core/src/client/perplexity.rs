//! PerplexityClient - chat completions over HTTP with SSE streaming

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::error::{upstream_message, ClientError, ClientResult};
use super::sse::{delta_content, is_error_payload, SseDecoder, DONE_MARKER};
use super::traits::{CompletionClient, CompletionRequest, TextStream};
use crate::logging::{describe_key, SharedLogger};
use crate::types::{CancellationToken, ChatMessage};

pub const DEFAULT_API_BASE: &str = "https://api.perplexity.ai";

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: Option<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for `POST {api_base}/chat/completions`
pub struct PerplexityClient {
    http: reqwest::Client,
    api_base: String,
    logger: SharedLogger,
}

impl PerplexityClient {
    /// Client against the public API with no request timeout
    pub fn new(logger: SharedLogger) -> ClientResult<Self> {
        Self::with_options(DEFAULT_API_BASE, None, logger)
    }

    /// Client against a custom base URL (proxies, tests)
    pub fn with_options(
        api_base: impl Into<String>,
        timeout: Option<Duration>,
        logger: SharedLogger,
    ) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder().pool_idle_timeout(POOL_IDLE_TIMEOUT);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_base: api_base.into(),
            logger,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    /// Send the request and return the response once its status is a success
    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
        cancel: &CancellationToken,
    ) -> ClientResult<reqwest::Response> {
        if !request.has_api_key() {
            return Err(ClientError::missing_api_key());
        }
        let key = request.api_key.trim();

        self.logger.debug(&format!(
            "[PerplexityClient] POST {} model={} stream={} messages={} key={}",
            self.endpoint(),
            request.model,
            stream,
            request.messages.len(),
            describe_key(Some(key))
        ));

        let body = WireRequest {
            model: request.model.as_str(),
            messages: &request.messages,
            stream,
            max_tokens: request.max_tokens,
        };
        let mut builder = self.http.post(self.endpoint()).bearer_auth(key).json(&body);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        let fut = builder.send();

        let response = cancel
            .run_until_cancelled(fut)
            .await
            .ok_or(ClientError::Cancelled)?
            .map_err(|e| ClientError::from_transport(&e).scrub(key))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let status_text = status.canonical_reason().unwrap_or("Request failed").to_string();
        let body = cancel
            .run_until_cancelled(response.text())
            .await
            .ok_or(ClientError::Cancelled)?
            .unwrap_or_default();
        let error = ClientError::from_status(status.as_u16(), &upstream_message(&body, &status_text)).scrub(key);
        self.logger.warn(&format!(
            "[PerplexityClient] HTTP {} -> {} ({})",
            status.as_u16(),
            error.code(),
            error
        ));
        Err(error)
    }
}

#[async_trait]
impl CompletionClient for PerplexityClient {
    async fn complete(&self, request: CompletionRequest, cancel: CancellationToken) -> ClientResult<String> {
        let response = self.send(&request, false, &cancel).await?;
        let key = request.api_key.trim();

        let parsed: WireResponse = cancel
            .run_until_cancelled(response.json())
            .await
            .ok_or(ClientError::Cancelled)?
            .map_err(|e| {
                if e.is_decode() {
                    ClientError::InvalidResponse(e.to_string()).scrub(key)
                } else {
                    ClientError::from_transport(&e).scrub(key)
                }
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();
        self.logger.debug(&format!(
            "[PerplexityClient] Completion received ({} chars)",
            content.len()
        ));
        Ok(content)
    }

    async fn stream(&self, request: CompletionRequest, cancel: CancellationToken) -> ClientResult<TextStream> {
        let response = self.send(&request, true, &cancel).await?;
        self.logger.debug("[PerplexityClient] Stream started");

        let body: BoxStream<'static, reqwest::Result<Vec<u8>>> =
            response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed();

        let state = StreamState {
            body,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            failure: None,
            finished: false,
            cancel,
            api_key: request.api_key.trim().to_string(),
            logger: self.logger.clone(),
        };
        Ok(Box::pin(stream::unfold(state, StreamState::next_item)))
    }
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    /// Upstream error reported inside the stream, surfaced after pending text
    failure: Option<ClientError>,
    finished: bool,
    cancel: CancellationToken,
    api_key: String,
    logger: SharedLogger,
}

impl StreamState {
    async fn next_item(mut self) -> Option<(ClientResult<String>, Self)> {
        loop {
            if self.cancel.is_cancelled() {
                if self.finished && self.pending.is_empty() {
                    return None;
                }
                self.logger.info("[PerplexityClient] Stream cancelled");
                self.finished = true;
                self.pending.clear();
                return Some((Err(ClientError::Cancelled), self));
            }
            if let Some(text) = self.pending.pop_front() {
                return Some((Ok(text), self));
            }
            if let Some(error) = self.failure.take() {
                return Some((Err(error), self));
            }
            if self.finished {
                return None;
            }

            match self.cancel.run_until_cancelled(self.body.next()).await {
                // Loop back to the cancellation branch above
                None => continue,
                Some(None) => {
                    self.finished = true;
                    if let Some(payload) = self.decoder.finish() {
                        self.accept(&payload);
                    }
                }
                Some(Some(Err(e))) => {
                    self.finished = true;
                    let error = ClientError::from_transport(&e).scrub(&self.api_key);
                    self.logger.error(&format!("[PerplexityClient] Stream error: {}", error));
                    return Some((Err(error), self));
                }
                Some(Some(Ok(bytes))) => {
                    for payload in self.decoder.push(&bytes) {
                        if !self.accept(&payload) {
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Queue the text of one SSE payload; false once the stream is done
    fn accept(&mut self, payload: &str) -> bool {
        if payload == DONE_MARKER {
            self.finished = true;
            return false;
        }
        if is_error_payload(payload) {
            let message = upstream_message(payload, "Stream failed");
            let error = ClientError::api(format!("Perplexity API Error: {}", message)).scrub(&self.api_key);
            self.logger.error(&format!("[PerplexityClient] Upstream error in stream: {}", error));
            self.failure = Some(error);
            self.finished = true;
            return false;
        }
        match delta_content(payload) {
            Some(text) => self.pending.push_back(text),
            None => self
                .logger
                .debug(&format!("[PerplexityClient] Skipping SSE payload without content ({} bytes)", payload.len())),
        }
        true
    }
}
