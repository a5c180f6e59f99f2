//! Bounded retry/backoff helpers for eventually-consistent object stores.

use firehose_store::BlobStoreError;
use std::{future::Future, time::Duration};

/// Attempts for transient read failures before giving up.
pub(crate) const READ_ATTEMPTS: u32 = 3;

/// Base delay doubled on every retry.
pub(crate) const READ_BASE_DELAY: Duration = Duration::from_millis(100);

/// Runs `op` up to `attempts` times, sleeping `base_delay * 2^n` between
/// tries. `NotFound` is not transient and returns immediately.
pub(crate) async fn retry_read<T, F, Fut>(
    attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, BlobStoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BlobStoreError>>,
{
    let mut delay = base_delay;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_not_found() => return Err(err),
            Err(err) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(err);
                }
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let out = retry_read(3, Duration::from_millis(10), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(BlobStoreError::Io { key: "k".into(), message: "flaky".into() })
            } else {
                Ok(42u32)
            }
        })
        .await;
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_short_circuits() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = retry_read(3, Duration::from_millis(10), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BlobStoreError::NotFound { key: "k".into() })
        })
        .await;
        assert!(out.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let out: Result<(), _> = retry_read(3, Duration::from_millis(10), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BlobStoreError::Io { key: "k".into(), message: "down".into() })
        })
        .await;
        assert!(!out.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
