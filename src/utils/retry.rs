//! Bounded retry policy for PubMed fetches.

use std::future::Future;
use std::time::Duration;

use crate::sources::SourceError;

/// Statuses the service uses to ask clients to come back later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    /// Server overloaded (500)
    ServerError,
    /// Too many requests (429)
    TooManyRequests,
}

impl TransientError {
    /// Classify an HTTP status
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            500 => Some(TransientError::ServerError),
            429 => Some(TransientError::TooManyRequests),
            _ => None,
        }
    }

    /// Classify a transport failure; only HTTP statuses are ever transient
    pub fn from_source_error(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::Transport {
                status: Some(status),
                ..
            } => Self::from_status(*status),
            _ => None,
        }
    }
}

/// Configuration for retry behavior
///
/// The client sleeps `pacing` before every fetch and `backoff` after every
/// transient failure; the caller loop decides whether another attempt is
/// allowed via `max_attempts`.
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of fetch attempts per identifier
    pub max_attempts: u32,
    /// Wait after a transient failure
    pub backoff: Duration,
    /// Mandatory pause before every fetch
    pub pacing: Duration,
    /// Which transport failures are transient
    pub retryable: fn(&SourceError) -> Option<TransientError>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(10),
            pacing: Duration::from_secs(1),
            retryable: TransientError::from_source_error,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Classify a failure with this policy's predicate
    pub fn classify(&self, err: &SourceError) -> Option<TransientError> {
        (self.retryable)(err)
    }
}

/// Run `operation` until it succeeds, fails permanently, or the attempt
/// budget is spent
///
/// Only `SourceError::Retryable` triggers another attempt. Any delay between
/// attempts is the operation's own business.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let mut operation = operation;
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Err(error @ SourceError::Retryable { .. }) => {
                if attempts >= max_attempts {
                    tracing::warn!("Operation failed after {} attempts: {}", attempts, error);
                    return Err(error);
                }
                tracing::debug!("Transient error on attempt {}: {}", attempts, error);
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let policy = RetryPolicy::default();
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(&policy, move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Ok("success")
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_transient_failures() {
        let policy = RetryPolicy::default().max_attempts(3);
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(&policy, move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    if *call_count.borrow() < 3 {
                        Err(SourceError::Retryable { status: 429 })
                    } else {
                        Ok("success")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_at_budget() {
        let policy = RetryPolicy::default();
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<(), SourceError> = {
            let call_count = call_count.clone();
            with_retry(&policy, move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(SourceError::Retryable { status: 500 })
                }
            })
        }
        .await;

        assert!(matches!(result, Err(SourceError::Retryable { status: 500 })));
        assert_eq!(*call_count.borrow(), 2);
    }

    #[tokio::test]
    async fn test_retry_returns_permanent_error() {
        let policy = RetryPolicy::default().max_attempts(5);
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<&str, SourceError> = {
            let call_count = call_count.clone();
            with_retry(&policy, move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(SourceError::Parse("not xml".to_string()))
                }
            })
        }
        .await;

        assert!(matches!(result, Err(SourceError::Parse(_))));
        assert_eq!(*call_count.borrow(), 1);
    }

    #[test]
    fn test_transient_error_detection() {
        let rate_limited = SourceError::Transport {
            status: Some(429),
            message: "Too Many Requests".to_string(),
        };
        assert_eq!(
            TransientError::from_source_error(&rate_limited),
            Some(TransientError::TooManyRequests)
        );

        let overloaded = SourceError::Transport {
            status: Some(500),
            message: "Internal Server Error".to_string(),
        };
        assert_eq!(
            TransientError::from_source_error(&overloaded),
            Some(TransientError::ServerError)
        );

        let unavailable = SourceError::Transport {
            status: Some(503),
            message: "Service Unavailable".to_string(),
        };
        assert!(TransientError::from_source_error(&unavailable).is_none());

        let refused = SourceError::Transport {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(TransientError::from_source_error(&refused).is_none());
    }

    #[test]
    fn test_max_attempts_is_at_least_one() {
        assert_eq!(RetryPolicy::default().max_attempts(0).max_attempts, 1);
    }
}
