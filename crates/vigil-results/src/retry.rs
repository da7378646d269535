//! Bounded retry for reporting submissions.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;
use vigil_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `op` until it succeeds, fails permanently or attempts run out.
    ///
    /// Only transient errors are retried. Exhaustion becomes
    /// `ReportingFailed` naming `target`.
    pub async fn run<T, F, Fut>(&self, target: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        target_service = %target,
                        attempt,
                        attempts,
                        error = %e,
                        "Submission failed, retrying"
                    );
                    sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(Error::ReportingFailed {
                        target: target.to_string(),
                        attempts,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let value = quick(3)
            .run("wiki", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Network("connection reset".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_reporting_failure() {
        let calls = AtomicU32::new(0);
        let err = quick(2)
            .run("resultsdb", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::Network("timed out".to_string()))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match err {
            Error::ReportingFailed { target, attempts, .. } => {
                assert_eq!(target, "resultsdb");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_authentication_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = quick(5)
            .run("wiki", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Error::AuthenticationFailed("bad token".to_string()))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, Error::AuthenticationFailed(_)));
    }
}
