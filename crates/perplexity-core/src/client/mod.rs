//! Perplexity chat-completion client
//!
//! - `CompletionClient`: trait the orchestrator talks to
//! - `PerplexityClient`: reqwest-based HTTP/SSE implementation
//! - `MockCompletionClient`: scripted replies for tests and offline hosts
//! - `RetryPolicy`: bounded linear backoff for non-streaming calls

mod error;
mod traits;
mod sse;
mod perplexity;
mod retry;
mod mock;

pub use error::{
    ClientError, ClientResult, AUTH_FAILED_MESSAGE, MISSING_KEY_MESSAGE, NETWORK_MESSAGE,
    RATE_LIMIT_MESSAGE,
};
pub use traits::{CompletionClient, CompletionRequest, ConnectionTestResult, TextStream};
pub use sse::SseDecoder;
pub use perplexity::{PerplexityClient, DEFAULT_API_BASE};
pub use retry::{RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
pub use mock::{MockCompletionClient, MockReply, RecordedCall};
