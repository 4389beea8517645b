//! Retry and per-host throttling for outbound fetches.
//!
//! Transient failures (429, network errors, 5xx) are retried with exponential
//! backoff. Everything else, including 403 blocks and parse failures, is
//! returned immediately so the caller's fallback chain can move on.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::ScraperError;

/// Longest server-requested wait honoured before a retry.
const MAX_RETRY_AFTER_SECS: u64 = 30;

/// Returns `true` if `err` represents a transient condition worth retrying.
fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::RateLimited { .. } | ScraperError::Http(_) => true,
        ScraperError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Backoff before retry `attempt` (0-based): `base * 2^attempt` seconds, but
/// never shorter than a server-supplied `Retry-After` (capped).
fn backoff_delay(err: &ScraperError, attempt: u32, backoff_base_secs: u64) -> Duration {
    let exponential = backoff_base_secs.saturating_mul(1u64 << attempt.min(62));
    let floor = match err {
        ScraperError::RateLimited { retry_after_secs, .. } => (*retry_after_secs).min(MAX_RETRY_AFTER_SECS),
        _ => 0,
    };
    Duration::from_secs(exponential.max(floor))
}

/// Run `operation`, retrying transient errors up to `max_retries` times.
///
/// With `max_retries = 2` the operation runs at most 3 times. Non-retriable
/// errors are returned without sleeping.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_secs: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if is_retriable(&err) && attempt < max_retries => err,
            Err(err) => return Err(err),
        };

        let delay = backoff_delay(&err, attempt, backoff_base_secs);
        tracing::debug!(
            attempt,
            max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient fetch error, backing off"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Spaces out sequential requests to the same host.
///
/// Each call to [`HostThrottle::wait`] reserves the next free slot for the
/// host and sleeps until it arrives. The lock is released before sleeping.
#[derive(Debug)]
pub(crate) struct HostThrottle {
    delay: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn wait(&self, host: &str) {
        if self.delay.is_zero() {
            return;
        }
        let now = Instant::now();
        let slot = {
            let Ok(mut slots) = self.next_slot.lock() else {
                return;
            };
            let slot = slots.get(host).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(host.to_string(), slot + self.delay);
            slot
        };
        if slot > now {
            tokio::time::sleep(slot - now).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rate_limited() -> ScraperError {
        ScraperError::RateLimited {
            domain: "www.example.com".to_owned(),
            retry_after_secs: 0,
        }
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<u32, ScraperError>(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_rate_limit_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited())
                } else {
                    Ok::<u32, ScraperError>(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn server_errors_are_retried_until_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ScraperError>(ScraperError::UnexpectedStatus {
                    status: 503,
                    url: "https://www.example.com/".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(ScraperError::UnexpectedStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn blocked_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, ScraperError>(ScraperError::Blocked {
                    domain: "www.example.com".to_owned(),
                    status: 403,
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ScraperError::Blocked { .. })));
    }

    #[tokio::test]
    async fn does_not_retry_deserialize_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                let e = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
                Err::<u32, ScraperError>(ScraperError::Deserialize {
                    context: "test".to_owned(),
                    source: e,
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ScraperError::Deserialize { .. })));
    }

    #[test]
    fn retry_after_is_a_floor_on_backoff() {
        let limited = ScraperError::RateLimited {
            domain: "www.example.com".to_owned(),
            retry_after_secs: 5,
        };
        assert_eq!(backoff_delay(&limited, 0, 1), Duration::from_secs(5));
        assert_eq!(backoff_delay(&limited, 3, 1), Duration::from_secs(8));
        let e = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let parse = ScraperError::Deserialize {
            context: "x".to_owned(),
            source: e,
        };
        assert_eq!(backoff_delay(&parse, 1, 2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_spaces_same_host_requests() {
        let throttle = HostThrottle::new(Duration::from_millis(500));
        let start = tokio::time::Instant::now();
        throttle.wait("www.example.com").await;
        throttle.wait("www.example.com").await;
        throttle.wait("other.example.com").await;
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(start.elapsed() < Duration::from_millis(1000));
    }
}
