//! Retry with exponential back-off and jitter for provider attempts.
//!
//! [`retry_with_backoff`] wraps one provider's attempts inside a fallback
//! chain entry: every attempt is bounded by a timeout, and retriable errors
//! (see [`ProviderError::is_retriable`]) are retried after a jittered delay.
//! Each attempt's outcome is reported to the caller through `on_attempt` so
//! the chain can keep an attempt log.

use std::future::Future;
use std::time::Duration;

use crate::error::ProviderError;

const MAX_DELAY_MS: u64 = 60_000;

/// Delay before retry number `attempt` (1-based).
///
/// Back-off schedule with `backoff_base_ms = 1_000`:
///
/// | Attempt | Sleep before next attempt        |
/// |---------|----------------------------------|
/// | 1       | 1 000 ms × 2⁰ ± 25 % jitter     |
/// | 2       | 1 000 ms × 2¹ ± 25 % jitter     |
/// | 3       | 1 000 ms × 2² ± 25 % jitter     |
///
/// The un-jittered delay is capped at 60 s.
#[must_use]
pub fn backoff_delay(backoff_base_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let computed = backoff_base_ms.saturating_mul(1u64 << exponent);
    let capped = computed.min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
    Duration::from_millis(delay_ms)
}

/// Runs `operation` up to `max_retries + 1` times, each bounded by `timeout`.
///
/// An attempt that exceeds `timeout` becomes [`ProviderError::Timeout`] and is
/// retried like any other transient error. Non-retriable errors are returned
/// immediately. `on_attempt` is called after every attempt with the 1-based
/// attempt number and the outcome.
pub(crate) async fn retry_with_backoff<T, F, Fut, A>(
    provider: &str,
    max_retries: u32,
    backoff_base_ms: u64,
    timeout: Duration,
    mut operation: F,
    mut on_attempt: A,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
    A: FnMut(u32, Result<(), &ProviderError>),
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let outcome = match tokio::time::timeout(timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: provider.to_owned(),
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match outcome {
            Ok(value) => {
                on_attempt(attempt, Ok(()));
                return Ok(value);
            }
            Err(err) => {
                on_attempt(attempt, Err(&err));
                if !err.is_retriable() || attempt > max_retries {
                    return Err(err);
                }
                let delay = backoff_delay(backoff_base_ms, attempt);
                tracing::warn!(
                    provider,
                    attempt,
                    max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "provider transient error, retrying after back-off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn server_error() -> ProviderError {
        ProviderError::Status {
            provider: "test".to_owned(),
            status: 503,
        }
    }

    #[test]
    fn backoff_delay_stays_within_jitter_band() {
        for attempt in 1..=4 {
            let expected = 100u64 * (1 << (attempt - 1));
            let ms = u64::try_from(backoff_delay(100, attempt).as_millis()).unwrap();
            assert!(
                ms >= expected * 3 / 4 && ms <= expected * 5 / 4,
                "attempt {attempt}: {ms}ms outside band around {expected}ms"
            );
        }
    }

    #[test]
    fn backoff_delay_is_capped() {
        let ms = u64::try_from(backoff_delay(50_000, 8).as_millis()).unwrap();
        assert!(ms <= 75_000, "{ms}ms exceeds cap plus jitter");
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&calls);
        let mut log = Vec::new();
        let result = retry_with_backoff(
            "test",
            3,
            0,
            Duration::from_secs(1),
            || {
                let cc = Arc::clone(&cc);
                async move {
                    cc.fetch_add(1, Ordering::SeqCst);
                    Ok::<u32, ProviderError>(42)
                }
            },
            |n, outcome| log.push((n, outcome.is_ok())),
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(log, vec![(1, true)]);
    }

    #[tokio::test]
    async fn retries_transient_error_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&calls);
        let result = retry_with_backoff(
            "test",
            3,
            0,
            Duration::from_secs(1),
            || {
                let cc = Arc::clone(&cc);
                async move {
                    if cc.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(server_error())
                    } else {
                        Ok::<u32, ProviderError>(7)
                    }
                }
            },
            |_, _| {},
        )
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&calls);
        let result = retry_with_backoff(
            "test",
            2,
            0,
            Duration::from_secs(1),
            || {
                let cc = Arc::clone(&cc);
                async move {
                    cc.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, ProviderError>(server_error())
                }
            },
            |_, _| {},
        )
        .await;
        // max_retries=2 → 3 total attempts
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(ProviderError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn does_not_retry_parse_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let cc = Arc::clone(&calls);
        let result = retry_with_backoff(
            "test",
            3,
            0,
            Duration::from_secs(1),
            || {
                let cc = Arc::clone(&cc);
                async move {
                    cc.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, ProviderError>(ProviderError::parse("test", "no answer"))
                }
            },
            |_, _| {},
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ProviderError::Parse { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_becomes_timeout() {
        let result = retry_with_backoff(
            "slow",
            0,
            0,
            Duration::from_millis(50),
            || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<u32, ProviderError>(1)
            },
            |_, _| {},
        )
        .await;
        assert!(
            matches!(result, Err(ProviderError::Timeout { timeout_ms: 50, .. })),
            "got {result:?}"
        );
    }
}
