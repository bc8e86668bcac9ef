//! Polling helpers for eventually consistent ARM reads.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::ProviderError;

/// The outcome of one attempt that did not succeed.
#[derive(Debug)]
pub enum RetryError {
    /// Try again after the interval.
    Retryable(ProviderError),
    /// Give up immediately.
    NonRetryable(ProviderError),
}

/// Run `attempt` until it succeeds, fails permanently, or `timeout` elapses.
///
/// On timeout the last retryable error is included in the
/// [`ProviderError::DeadlineExceeded`] message.
pub async fn retry_until<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut attempt: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last = match attempt().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(err)) => return Err(err),
            Err(RetryError::Retryable(err)) => err,
        };

        let now = Instant::now();
        if now >= deadline {
            return Err(ProviderError::DeadlineExceeded(format!(
                "timed out after {:?} ({} attempts): {}",
                timeout,
                attempts,
                last.message()
            )));
        }

        debug!(attempt = attempts, error = %last, "Retrying");
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let value = retry_until(Duration::from_secs(5), Duration::ZERO, || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RetryError::Retryable(ProviderError::NotFound("rule".into())))
            } else {
                Ok("visible")
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "visible");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_stops() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = retry_until::<(), _, _>(Duration::from_secs(5), Duration::ZERO, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RetryError::NonRetryable(ProviderError::PermissionDenied(
                "forbidden".into(),
            )))
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ProviderError::PermissionDenied(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_reports_last_error() {
        let err = retry_until::<(), _, _>(
            Duration::from_millis(30),
            Duration::from_millis(10),
            || async {
                Err(RetryError::Retryable(ProviderError::NotFound("still missing".into())))
            },
        )
        .await
        .unwrap_err();

        match err {
            ProviderError::DeadlineExceeded(message) => {
                assert!(message.contains("still missing"), "{message}")
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
