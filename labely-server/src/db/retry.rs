//! Database Retry Logic
//!
//! Exponential backoff for transient SQLite lock contention, bounded by
//! `session.max_lock_wait_ms`.

use std::time::{Duration, Instant};

use crate::error::{is_transient, Error, Result};

const INITIAL_BACKOFF_MS: u64 = 10;
const MAX_BACKOFF_MS: u64 = 1000;

fn is_lock_error(err: &Error) -> bool {
    match err {
        Error::Database(db_err) => is_transient(db_err),
        Error::Common(labely_common::Error::Database(db_err)) => is_transient(db_err),
        _ => false,
    }
}

/// Retry a database operation until it succeeds, fails with a non-lock
/// error, or `max_wait_ms` elapses
///
/// Backoff starts at 10ms and doubles up to 1s. When the budget runs out the
/// last lock error is returned unchanged, so callers still see it as
/// retryable.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !is_lock_error(&err) => return Err(err),
            Err(err) => {
                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database still locked, giving up"
                    );
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let result = retry_on_lock("test_op", 1000, || async { Ok::<_, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_pool_timeout_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = retry_on_lock("test_op", 1000, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::Database(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_lock_error_fails_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = retry_on_lock("test_op", 1000, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::InvalidLabel("bad".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(Error::InvalidLabel(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let result: Result<()> = retry_on_lock("test_op", 30, || async {
            Err(Error::Database(sqlx::Error::PoolTimedOut))
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_retryable());
    }
}
