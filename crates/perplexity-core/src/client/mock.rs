//! Mock completion client for testing
//!
//! Replies are scripted up front and consumed in order, one per call, so a
//! test can describe "first call returns a tool directive, second call streams
//! these chunks" without any network.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;

use super::error::{ClientError, ClientResult};
use super::traits::{CompletionClient, CompletionRequest, TextStream};
use crate::logging::{Logger, NoOpLogger};
use crate::types::CancellationToken;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Full text; streamed as a single chunk when consumed by `stream`
    Text(String),
    /// Chunks with a delay before each one, optionally failing afterwards
    Chunks {
        chunks: Vec<String>,
        delay: Duration,
        then: Option<ClientError>,
    },
    /// Fail the call itself
    Error(ClientError),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MockReply::Chunks {
            chunks: chunks.into_iter().map(Into::into).collect(),
            delay: Duration::ZERO,
            then: None,
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        match self {
            MockReply::Chunks { chunks, then, .. } => MockReply::Chunks { chunks, delay, then },
            other => other,
        }
    }

    pub fn then_fail(self, error: ClientError) -> Self {
        match self {
            MockReply::Chunks { chunks, delay, .. } => MockReply::Chunks {
                chunks,
                delay,
                then: Some(error),
            },
            other => other,
        }
    }
}

/// A call the mock received
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: CompletionRequest,
    pub streaming: bool,
}

/// Scripted completion client
pub struct MockCompletionClient {
    replies: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<RecordedCall>>,
    logger: Arc<dyn Logger>,
}

impl Default for MockCompletionClient {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MockCompletionClient {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
            logger: Arc::new(NoOpLogger::new()),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Append another reply to the script
    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().push_back(reply);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn stream_call_count(&self) -> usize {
        self.calls.lock().iter().filter(|c| c.streaming).count()
    }

    fn take_reply(&self, request: CompletionRequest, streaming: bool) -> ClientResult<MockReply> {
        if !request.has_api_key() {
            return Err(ClientError::missing_api_key());
        }
        self.calls.lock().push(RecordedCall { request, streaming });
        let reply = self.replies.lock().pop_front();
        self.logger.debug(&format!(
            "[MockCompletionClient] call streaming={} scripted={}",
            streaming,
            reply.is_some()
        ));
        reply.ok_or_else(|| ClientError::InvalidResponse("no scripted reply left".to_string()))
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: CompletionRequest, cancel: CancellationToken) -> ClientResult<String> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        match self.take_reply(request, false)? {
            MockReply::Text(text) => Ok(text),
            MockReply::Chunks { chunks, then: None, .. } => Ok(chunks.concat()),
            MockReply::Chunks { then: Some(e), .. } | MockReply::Error(e) => Err(e),
        }
    }

    async fn stream(&self, request: CompletionRequest, cancel: CancellationToken) -> ClientResult<TextStream> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let (chunks, delay, then) = match self.take_reply(request, true)? {
            MockReply::Text(text) => (vec![text], Duration::ZERO, None),
            MockReply::Chunks { chunks, delay, then } => (chunks, delay, then),
            MockReply::Error(e) => return Err(e),
        };

        let state = (VecDeque::from(chunks), then, cancel, false);
        let stream = stream::unfold(state, move |(mut chunks, mut then, cancel, done)| async move {
            if done {
                return None;
            }
            if !delay.is_zero() && !chunks.is_empty() {
                cancel.run_until_cancelled(tokio::time::sleep(delay)).await;
            }
            if cancel.is_cancelled() {
                return Some((Err(ClientError::Cancelled), (chunks, then, cancel, true)));
            }
            match chunks.pop_front() {
                Some(chunk) => Some((Ok(chunk), (chunks, then, cancel, false))),
                None => then.take().map(|e| (Err(e), (chunks, None, cancel, true))),
            }
        });
        Ok(Box::pin(stream))
    }
}
