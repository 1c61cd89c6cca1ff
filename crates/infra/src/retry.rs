//! Bounded retries for store writes.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::store::StoreError;

/// Exponential backoff: `base * 2^(attempt-1)`, capped at 10s.
pub fn backoff(base: Duration, attempt: u32) -> Duration {
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}

/// Run `op` up to `attempts` times, pausing between transient failures.
/// Non-transient errors are returned immediately.
pub async fn with_retries<T, F, Fut>(
    what: &'static str,
    attempts: u32,
    base: Duration,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(op = what, attempt, error = %e, "store write failed; retrying");
                tokio::time::sleep(backoff(base, attempt)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff(base, 1), Duration::from_millis(100));
        assert_eq!(backoff(base, 3), Duration::from_millis(400));
        assert_eq!(backoff(base, 30), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let calls = &AtomicU32::new(0);
        let out = with_retries("test", 3, Duration::from_millis(10), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::Unavailable("down".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(out, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn conflicts_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let out: Result<(), _> = with_retries("test", 5, Duration::from_millis(10), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Conflict("stale".into()))
        })
        .await;
        assert!(matches!(out, Err(StoreError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
