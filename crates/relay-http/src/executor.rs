//! # Request executor
//!
//! Runs one logical call as a series of attempts:
//!
//! 1. Each attempt races a hard deadline. A miss is [`HttpError::Timeout`];
//!    the attempt future is dropped, which is all the cancellation the
//!    transport is promised.
//! 2. Idempotent calls retry up to `max_retries` times, sleeping
//!    `base_delay * 2^i` after failure `i`. Other calls get one attempt.
//! 3. The final failure is returned exactly as the attempt produced it.
//!
//! Payment challenges never reach this layer as such: the payment middleware
//! answers them inside a single attempt and reports only its final outcome.

use std::future::Future;
use std::time::Duration;

use relay_core::RetryConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::HttpError;

/// Bookkeeping for one logical call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Zero-based index of the attempt in flight.
    pub attempt: u32,
    /// Delay computed after the most recent failure.
    pub delay_ms: u64,
    /// Sum of all delays so far.
    pub total_delay_ms: u64,
}

/// Timeout and retry policy for outbound calls.
#[derive(Clone, Debug)]
pub struct RequestExecutor {
    retry: RetryConfig,
    timeout: Duration,
    cancel_token: Option<CancellationToken>,
}

impl Default for RequestExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default(), 30_000)
    }
}

impl RequestExecutor {
    /// Create an executor with a per-attempt timeout in milliseconds.
    pub fn new(retry: RetryConfig, timeout_ms: u64) -> Self {
        Self {
            retry,
            timeout: Duration::from_millis(timeout_ms),
            cancel_token: None,
        }
    }

    /// Abort pending backoff sleeps when `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Same policy with a different per-attempt timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout = Duration::from_millis(timeout_ms);
        self
    }

    /// Per-attempt timeout in milliseconds.
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Run `operation` under this policy.
    ///
    /// `operation` is called once per attempt and must build a fresh future
    /// each time.
    pub async fn execute<T, F, Fut>(&self, idempotent: bool, mut operation: F) -> Result<T, HttpError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HttpError>>,
    {
        let max_retries = if idempotent { self.retry.max_retries } else { 0 };
        let mut state = RetryState::default();

        loop {
            let outcome = match tokio::time::timeout(self.timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(HttpError::Timeout {
                    timeout_ms: self.timeout_ms(),
                }),
            };

            let err = match outcome {
                Ok(value) => {
                    if state.attempt > 0 {
                        debug!(
                            attempts = state.attempt + 1,
                            total_delay_ms = state.total_delay_ms,
                            "request succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if state.attempt >= max_retries || !err.is_retryable() {
                return Err(err);
            }
            if self.cancel_token.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(HttpError::Cancelled);
            }

            state.delay_ms = self.retry.delay_for(state.attempt);
            state.total_delay_ms += state.delay_ms;
            warn!(
                attempt = state.attempt + 1,
                max_retries,
                delay_ms = state.delay_ms,
                category = err.category(),
                error = %err,
                "request failed, retrying"
            );
            metrics::counter!("relay_http_retries_total", "category" => err.category()).increment(1);

            let delay = Duration::from_millis(state.delay_ms);
            if let Some(ref token) = self.cancel_token {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = token.cancelled() => return Err(HttpError::Cancelled),
                }
            } else {
                tokio::time::sleep(delay).await;
            }
            state.attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn executor() -> RequestExecutor {
        RequestExecutor::new(RetryConfig::default(), 1_000)
    }

    /// Fails `failures` times with a 503, then returns the attempt count.
    fn flaky(calls: &Arc<AtomicU32>, failures: u32) -> impl FnMut() -> futures::future::Ready<Result<u32, HttpError>> {
        let calls = calls.clone();
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            futures::future::ready(if n <= failures {
                Err(HttpError::Status {
                    status: 503,
                    body: format!("attempt {n}"),
                })
            } else {
                Ok(n)
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_idempotent_with_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();
        let value = executor().execute(true, flaky(&calls, 2)).await.unwrap();
        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_between_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let stamps = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let started = Instant::now();
        let op = {
            let stamps = stamps.clone();
            let mut inner = flaky(&calls, 2);
            move || {
                stamps.lock().push(started.elapsed().as_millis());
                inner()
            }
        };
        let _ = executor().execute(true, op).await.unwrap();
        let stamps = stamps.lock().clone();
        assert_eq!(stamps.len(), 3);
        assert!(stamps[1] - stamps[0] >= 100);
        assert!(stamps[2] - stamps[1] >= 200);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_error_unchanged() {
        let calls = Arc::new(AtomicU32::new(0));
        let err = executor().execute(true, flaky(&calls, 10)).await.unwrap_err();
        // 1 attempt + 2 retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_matches!(err, HttpError::Status { status: 503, body } if body == "attempt 3");
    }

    #[tokio::test(start_paused = true)]
    async fn non_idempotent_gets_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let err = executor().execute(false, flaky(&calls, 1)).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_matches!(err, HttpError::Status { status: 503, .. });
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_configured() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RequestExecutor::new(
            RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            },
            1_000,
        );
        assert!(executor.execute(true, flaky(&calls, 1)).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out() {
        let executor = RequestExecutor::new(RetryConfig::default(), 50);
        let err = executor
            .execute(false, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, HttpError>(())
            })
            .await
            .unwrap_err();
        assert_matches!(err, HttpError::Timeout { timeout_ms: 50 });
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried_for_idempotent_calls() {
        let calls = Arc::new(AtomicU32::new(0));
        let executor = RequestExecutor::new(RetryConfig::default(), 50);
        let value = executor
            .execute(true, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Ok::<_, HttpError>(n)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_request_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let err = executor()
            .execute(true, || {
                let _ = calls.fetch_add(1, Ordering::SeqCst);
                futures::future::ready(Err::<(), _>(HttpError::invalid("bad header")))
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_matches!(err, HttpError::InvalidRequest { .. });
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let token = CancellationToken::new();
        let executor = executor().with_cancellation(token.clone());
        let calls = Arc::new(AtomicU32::new(0));
        let op = {
            let token = token.clone();
            let mut inner = flaky(&calls, 10);
            move || {
                token.cancel();
                inner()
            }
        };
        let err = executor.execute(true, op).await.unwrap_err();
        assert_matches!(err, HttpError::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timeout_accessors() {
        let executor = executor().with_timeout_ms(250);
        assert_eq!(executor.timeout_ms(), 250);
    }
}
