//! Bounded retry with linear backoff for non-streaming calls

use std::future::Future;
use std::time::Duration;

use super::error::{ClientError, ClientResult};
use crate::config::ExtensionSettings;
use crate::logging::Logger;
use crate::types::CancellationToken;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Retry policy for a single request
///
/// The delay before attempt `n` (n >= 2) is `base_delay * (n - 1)`. Only
/// errors with [`ClientError::is_retryable`] are retried, and the last error
/// is returned unchanged once attempts run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Single attempt, no backoff
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_settings(settings: &ExtensionSettings) -> Self {
        match settings.retries {
            Some(attempts) => Self::new(attempts, DEFAULT_BASE_DELAY),
            None => Self::default(),
        }
    }

    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.saturating_sub(1)
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out
    ///
    /// `op` receives the 1-based attempt number. Cancelling `cancel` during a
    /// backoff sleep returns [`ClientError::Cancelled`] at once.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, logger: &dyn Logger, mut op: F) -> ClientResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_before(attempt + 1);
                    logger.warn(&format!(
                        "[Retry] Attempt {}/{} failed ({}), retrying in {}ms",
                        attempt,
                        max_attempts,
                        e.code(),
                        delay.as_millis()
                    ));
                    cancel
                        .run_until_cancelled(tokio::time::sleep(delay))
                        .await
                        .ok_or(ClientError::Cancelled)?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn server_error() -> ClientError {
        ClientError::from_status(503, "overloaded")
    }

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_secs(1));
        assert_eq!(policy.delay_before(3), Duration::from_secs(2));
    }

    #[test]
    fn test_from_settings() {
        let mut settings = ExtensionSettings::default();
        assert_eq!(RetryPolicy::from_settings(&settings), RetryPolicy::default());
        settings.retries = Some(5);
        assert_eq!(RetryPolicy::from_settings(&settings).max_attempts, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_error_exhausts_three_attempts() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let started = Instant::now();
        let calls_in = calls.clone();

        let result: ClientResult<()> = RetryPolicy::default()
            .run(&CancellationToken::new(), &NoOpLogger::new(), |attempt| {
                let calls = calls_in.clone();
                async move {
                    calls.lock().push((attempt, started.elapsed()));
                    Err(server_error())
                }
            })
            .await;

        assert_eq!(result.unwrap_err(), server_error());
        let calls = calls.lock();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].1, Duration::from_secs(1));
        assert_eq!(calls[2].1, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_after_one_attempt() {
        let mut count = 0;
        let result: ClientResult<()> = RetryPolicy::default()
            .run(&CancellationToken::new(), &NoOpLogger::new(), |_| {
                count += 1;
                async { Err(ClientError::from_status(400, "bad model")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_rate_limit() {
        let result = RetryPolicy::default()
            .run(&CancellationToken::new(), &NoOpLogger::new(), |attempt| async move {
                if attempt == 1 {
                    Err(ClientError::from_status(429, ""))
                } else {
                    Ok("answer")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "answer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            canceller.cancel();
        });

        let mut count = 0;
        let result: ClientResult<()> = RetryPolicy::default()
            .run(&token, &NoOpLogger::new(), |_| {
                count += 1;
                async { Err(ClientError::Network("down".into())) }
            })
            .await;

        assert_eq!(result.unwrap_err(), ClientError::Cancelled);
        assert_eq!(count, 1);
    }
}
