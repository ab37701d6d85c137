//! Completion client error taxonomy

use std::error::Error as StdError;
use std::io;

use thiserror::Error;

use crate::logging::redact;

pub const RATE_LIMIT_MESSAGE: &str = "API rate limit exceeded. Please try again later.";
pub const NETWORK_MESSAGE: &str = "A network error occurred. Please check your connection.";
pub const MISSING_KEY_MESSAGE: &str = "Perplexity API key is not configured.";
pub const AUTH_FAILED_MESSAGE: &str =
    "Authentication failed. Please check your Perplexity API key.";

/// Errors surfaced by a completion request
///
/// Every variant renders as a single human-readable message suitable for the
/// chat panel. Messages never contain the API key: anything built from
/// upstream text passes through [`ClientError::scrub`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Missing or unusable credential, detected before any network call
    #[error("{0}")]
    Configuration(String),

    /// HTTP 429
    #[error("{0}")]
    RateLimit(String),

    /// Upstream rejected the request; retryable only for 5xx
    #[error("{message}")]
    Api { message: String, retryable: bool },

    /// DNS, connect, timeout, or connection reset
    #[error("{0}")]
    Network(String),

    /// Aborted through the request's cancellation token
    #[error("Request cancelled")]
    Cancelled,

    /// Body could not be decoded as a chat completion
    #[error("Invalid response from Perplexity: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn missing_api_key() -> Self {
        Self::Configuration(MISSING_KEY_MESSAGE.to_string())
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
            retryable: false,
        }
    }

    /// Map a non-success HTTP status and its upstream error text
    pub fn from_status(status: u16, upstream: &str) -> Self {
        match status {
            429 => Self::RateLimit(RATE_LIMIT_MESSAGE.to_string()),
            400 => Self::api(format!(
                "Model or parameters not supported by Perplexity. (Original error: {})",
                upstream
            )),
            401 => Self::api(AUTH_FAILED_MESSAGE),
            s if s >= 500 => Self::Api {
                message: format!("Perplexity API Error: {}", upstream),
                retryable: true,
            },
            _ => Self::api(format!("Perplexity API Error: {}", upstream)),
        }
    }

    /// Map a transport failure from the HTTP client
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || is_connection_reset(err) {
            return Self::Network(NETWORK_MESSAGE.to_string());
        }
        Self::api(err.to_string())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::RateLimit(_) => "RATE_LIMIT_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit(_) | Self::Network(_) => true,
            Self::Api { retryable, .. } => *retryable,
            Self::Configuration(_) | Self::Cancelled | Self::InvalidResponse(_) => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Remove `secret` from the message
    pub fn scrub(self, secret: &str) -> Self {
        match self {
            Self::Configuration(m) => Self::Configuration(redact(&m, secret)),
            Self::RateLimit(m) => Self::RateLimit(redact(&m, secret)),
            Self::Api { message, retryable } => Self::Api {
                message: redact(&message, secret),
                retryable,
            },
            Self::Network(m) => Self::Network(redact(&m, secret)),
            Self::InvalidResponse(m) => Self::InvalidResponse(redact(&m, secret)),
            Self::Cancelled => Self::Cancelled,
        }
    }
}

/// Walk the source chain looking for a reset or aborted connection
pub(crate) fn is_connection_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Pull a human-readable message out of an upstream error body
///
/// Perplexity answers with `{"error": {"message": ...}}`; older gateways send
/// `{"detail": ...}` or plain text.
pub(crate) fn upstream_message(body: &str, status_text: &str) -> String {
    let trimmed = body.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("error").filter(|v| v.is_string()))
            .or_else(|| value.get("detail"))
            .or_else(|| value.get("message"));
        if let Some(m) = message {
            return match m.as_str() {
                Some(s) => s.to_string(),
                None => m.to_string(),
            };
        }
    }
    if trimmed.is_empty() {
        status_text.to_string()
    } else {
        trimmed.to_string()
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
