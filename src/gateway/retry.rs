//! Bounded retry helper
//!
//! Gateway timeouts and failures are returned, not retried automatically;
//! callers that do want retries use this helper. The allow-list of
//! unretryable kinds makes permanent failures stop immediately instead of
//! burning attempts.

use crate::error::{ErrorKind, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay between attempts
    pub delay: Duration,
    /// Error kinds that must never be retried
    pub unretryable: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            unretryable: vec![
                ErrorKind::TransportUnavailable,
                ErrorKind::InteractionConfigInvalid,
                ErrorKind::RoleMismatch,
            ],
        }
    }
}

impl RetryPolicy {
    /// Policy with an explicit unretryable allow-list
    pub fn with_unretryable(mut self, kinds: Vec<ErrorKind>) -> Self {
        self.unretryable = kinds;
        self
    }
}

/// Run an operation under a retry policy
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if policy.unretryable.contains(&e.kind()) => {
                debug!("Attempt {} failed with unretryable error: {}", attempt, e);
                return Err(e);
            }
            Err(e) if attempt >= policy.max_attempts => {
                warn!("Giving up after {} attempts: {}", attempt, e);
                return Err(e);
            }
            Err(e) => {
                debug!("Attempt {} failed, retrying: {}", attempt, e);
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = retry(&policy, || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::operation_timeout("slow peer"))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 2,
            ..Default::default()
        };

        let result: Result<()> = retry(&policy, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::operation_timeout("slow peer"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unretryable_error_stops_immediately() {
        let attempts = AtomicU32::new(0);
        let policy =
            RetryPolicy::default().with_unretryable(vec![ErrorKind::OperationFailed]);

        let result: Result<()> = retry(&policy, || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(Error::operation_failed("target page closed"))
        })
        .await;

        assert!(matches!(result.unwrap_err(), Error::OperationFailed(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
