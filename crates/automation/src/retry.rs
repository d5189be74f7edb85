use std::future::Future;
use std::time::Duration;

use loandesk_core::config::CrmPortalConfig;
use loandesk_core::Console;
use tracing::warn;

use crate::portal::PortalError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl From<&CrmPortalConfig> for RetryPolicy {
    fn from(config: &CrmPortalConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FailureKind {
    Server,
    RateLimited,
    Other,
}

impl FailureKind {
    fn of(error: &PortalError) -> Self {
        if error.is_server_error() {
            Self::Server
        } else if error.is_rate_limited() {
            Self::RateLimited
        } else {
            Self::Other
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following zero-based `attempt`. Server errors
    /// back off by powers of two, rate limiting by powers of three, anything
    /// else waits the base delay.
    fn backoff(&self, attempt: u32, kind: FailureKind) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = match kind {
            FailureKind::Server => 2_u64.saturating_pow(exponent),
            FailureKind::RateLimited => 3_u64.saturating_pow(exponent),
            FailureKind::Other => 1,
        };
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(multiplier).min(max_ms))
    }

    /// Runs `call` until it succeeds, fails with an auth error, or the attempt
    /// budget is spent. Progress is printed to the console so it reaches the
    /// session's status stream.
    pub async fn run<T, F, Fut>(&self, console: &Console, mut call: F) -> Result<T, PortalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PortalError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            console.println(format!(
                "API call failed (attempt {}/{}): {error}",
                attempt + 1,
                max_attempts
            ));
            warn!(
                event_name = "automation.portal.call_failed",
                attempt = attempt + 1,
                max_attempts,
                error = %error,
                "portal call failed"
            );

            if error.is_auth_failure() {
                return Err(error);
            }
            if attempt + 1 >= max_attempts {
                console.println("Max retries reached.");
                return Err(error);
            }

            let kind = FailureKind::of(&error);
            let delay = self.backoff(attempt, kind);
            let label = match kind {
                FailureKind::Server => "Server error detected",
                FailureKind::RateLimited => "Rate limit detected",
                FailureKind::Other => "Other error",
            };
            console.println(format!(
                "{label}. Waiting {:.1} seconds before retry...",
                delay.as_secs_f64()
            ));
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use loandesk_core::{Console, DetachedInput, MemorySink};

    use super::{FailureKind, RetryPolicy};
    use crate::portal::PortalError;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn backoff_grows_by_failure_kind_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(policy.backoff(0, FailureKind::Server), Duration::from_secs(2));
        assert_eq!(policy.backoff(2, FailureKind::Server), Duration::from_secs(8));
        assert_eq!(policy.backoff(2, FailureKind::RateLimited), Duration::from_secs(18));
        assert_eq!(policy.backoff(3, FailureKind::Other), Duration::from_secs(2));
        assert_eq!(policy.backoff(10, FailureKind::Server), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let sink = Arc::new(MemorySink::default());
        let console = Console::new(Arc::new(DetachedInput), sink.clone());
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let value = fast_policy(5)
            .run(&console, move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(PortalError::UnexpectedStatus(503))
                } else {
                    Ok("customers")
                }
            })
            .await
            .expect("third attempt succeeds");

        assert_eq!(value, "customers");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let lines = sink.lines();
        assert_eq!(lines[0], "API call failed (attempt 1/5): CRM portal returned HTTP 503");
        assert!(lines[1].starts_with("Server error detected. Waiting"));
    }

    #[tokio::test]
    async fn auth_failures_are_not_retried() {
        let console = Console::new(Arc::new(DetachedInput), Arc::new(MemorySink::default()));
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let error = fast_policy(5)
            .run(&console, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PortalError::InvalidCredentials)
            })
            .await
            .expect_err("credentials rejected");

        assert_eq!(error, PortalError::InvalidCredentials);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn attempt_budget_is_respected() {
        let sink = Arc::new(MemorySink::default());
        let console = Console::new(Arc::new(DetachedInput), sink.clone());
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let error = fast_policy(3)
            .run(&console, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PortalError::Transport("connection refused".into()))
            })
            .await
            .expect_err("budget spent");

        assert!(matches!(error, PortalError::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.lines().last().map(String::as_str), Some("Max retries reached."));
    }
}
