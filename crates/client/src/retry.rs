use std::future::Future;
use std::time::Duration;

use ridehub_core::config::ApiConfig;
use ridehub_core::ApplicationError;

/// Bounded exponential backoff for idempotent reads. Mutations never go
/// through this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadRetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for ReadRetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_millis(250), multiplier: 2 }
    }
}

impl ReadRetryPolicy {
    pub fn from_config(api: &ApiConfig) -> Self {
        Self {
            max_attempts: api.read_max_attempts.max(1),
            base_delay: Duration::from_millis(api.read_retry_base_delay_ms),
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    /// Delay before the attempt after `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(self.multiplier.saturating_pow(attempt))
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ApplicationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApplicationError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        event_name = "client.read_retry",
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "read failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use ridehub_core::ApplicationError;

    use super::ReadRetryPolicy;

    fn fast(max_attempts: u32) -> ReadRetryPolicy {
        ReadRetryPolicy { max_attempts, base_delay: Duration::from_millis(1), multiplier: 2 }
    }

    #[test]
    fn delays_grow_exponentially() {
        let policy = ReadRetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn transport_failures_are_retried_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = fast(3)
            .run("list_bookings", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ApplicationError::Transport("connection reset".to_string()))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast(2)
            .run("list_bookings", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApplicationError::Transport("down".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn session_and_conflict_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = fast(5)
            .run("list_bookings", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApplicationError::SessionInvalid("401".to_string()))
            })
            .await;
        assert!(matches!(result, Err(ApplicationError::SessionInvalid(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
