//! Idempotency- and budget-aware retry policy
//!
//! Retries happen only when every condition holds: attempts remain, the
//! classified error is retryable, the operation is idempotent, the error
//! category is not a governance denial, and the live budget still allows
//! another attempt. Governance denials are never retried, even when an
//! error instance claims to be retryable.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use warden_governance::BudgetEnforcer;
use warden_types::{Error, ErrorCategory};

use crate::classify::ErrorClassifier;
use crate::error::Failure;

/// Categories excluded from retry regardless of the `retryable` flag
const NEVER_RETRIED: [ErrorCategory; 3] = [
    ErrorCategory::ValidationError,
    ErrorCategory::PermissionError,
    ErrorCategory::BudgetExceeded,
];

/// Retry policy with exponential backoff and jitter
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    exponential_base: f64,
    budget_enforcer: Option<BudgetEnforcer>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            budget_enforcer: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum attempts, including the initial one
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Initial and maximum backoff delays
    pub fn with_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_delay = initial;
        self.max_delay = max;
        self
    }

    /// Base of the exponential backoff
    pub fn with_exponential_base(mut self, base: f64) -> Self {
        self.exponential_base = base;
        self
    }

    /// Attach a budget enforcer re-checked before every retry
    pub fn with_budget_enforcer(mut self, enforcer: BudgetEnforcer) -> Self {
        self.budget_enforcer = Some(enforcer);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether a classified error should be retried after `attempt`
    /// (1-indexed; 1 is the initial attempt)
    pub fn should_retry(&self, error: &Error, attempt: u32, is_idempotent: bool) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        if !error.retryable {
            return false;
        }
        if !is_idempotent {
            return false;
        }
        if NEVER_RETRIED.contains(&error.error_type) {
            return false;
        }
        if let Some(enforcer) = &self.budget_enforcer {
            if enforcer.check().is_err() {
                return false;
            }
        }
        true
    }

    /// Backoff delay before the retry following `attempt`
    ///
    /// `initial_delay * base^(attempt-1)`, capped at `max_delay`, plus up
    /// to 10% uniform jitter.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let backoff =
            self.initial_delay.as_secs_f64() * self.exponential_base.powi(exponent as i32);
        let capped = backoff.min(self.max_delay.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.0..=capped * 0.1);
        Duration::from_secs_f64(capped + jitter)
    }

    /// Drive an operation through the retry loop
    ///
    /// Each failure is classified to decide retryability; between attempts
    /// the computed backoff is slept. When a retry is refused (attempts
    /// exhausted, non-retryable category, non-idempotent operation, or
    /// exhausted budget) the original failure surfaces unchanged.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        mut operation: F,
        source: &str,
        is_idempotent: bool,
    ) -> Result<T, Failure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(failure) => {
                    let error = ErrorClassifier::classify(&failure, source);
                    if !self.should_retry(&error, attempt, is_idempotent) {
                        return Err(failure);
                    }
                    let delay = self.retry_delay(attempt);
                    tracing::debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use warden_governance::{BudgetTracker, PermissionError};
    use warden_types::{BudgetLimits, ErrorSeverity};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(max_attempts)
            .with_delays(Duration::from_millis(1), Duration::from_millis(5))
    }

    fn error(category: ErrorCategory, retryable: bool) -> Error {
        Error::new(category, "boom", ErrorSeverity::High, retryable, "test")
    }

    #[test]
    fn respects_the_attempt_ceiling() {
        let policy = fast_policy(3);
        let err = error(ErrorCategory::ExecutionFailure, true);
        assert!(policy.should_retry(&err, 1, true));
        assert!(policy.should_retry(&err, 2, true));
        assert!(!policy.should_retry(&err, 3, true));
    }

    #[test]
    fn governance_categories_are_never_retried() {
        let policy = fast_policy(5);
        // retryable=true cannot override the categorical ban
        for category in [
            ErrorCategory::ValidationError,
            ErrorCategory::PermissionError,
            ErrorCategory::BudgetExceeded,
        ] {
            assert!(!policy.should_retry(&error(category, true), 1, true));
        }
    }

    #[test]
    fn non_idempotent_operations_are_never_retried() {
        let policy = fast_policy(5);
        let err = error(ErrorCategory::Timeout, true);
        assert!(policy.should_retry(&err, 1, true));
        assert!(!policy.should_retry(&err, 1, false));
    }

    #[test]
    fn exhausted_budget_refuses_retry() {
        let tracker = Arc::new(BudgetTracker::new(BudgetLimits {
            call_limit: Some(1),
            ..BudgetLimits::unbounded()
        }));
        tracker.record_call();
        let policy = fast_policy(5).with_budget_enforcer(BudgetEnforcer::new(tracker));
        assert!(!policy.should_retry(&error(ErrorCategory::Timeout, true), 1, true));
    }

    #[test]
    fn delay_grows_exponentially_with_cap_and_jitter() {
        let policy = RetryPolicy::new()
            .with_delays(Duration::from_secs(1), Duration::from_secs(4))
            .with_exponential_base(2.0);

        for (attempt, base) in [(1u32, 1.0f64), (2, 2.0), (3, 4.0), (4, 4.0)] {
            let delay = policy.retry_delay(attempt).as_secs_f64();
            assert!(delay >= base, "attempt {attempt}: {delay} < {base}");
            assert!(delay <= base * 1.1, "attempt {attempt}: {delay} > {}", base * 1.1);
        }
    }

    #[tokio::test]
    async fn permission_failure_is_not_retried_even_when_idempotent() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let policy = fast_policy(5);

        let result: Result<(), Failure> = policy
            .execute_with_retry(
                move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(Failure::Permission(PermissionError {
                            required: vec!["write".into()],
                            missing: vec!["write".into()],
                            available: vec![],
                        }))
                    }
                },
                "test:retry",
                true,
            )
            .await;

        assert!(matches!(result.unwrap_err(), Failure::Permission(_)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_is_retried_then_the_original_failure_surfaces() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let policy = fast_policy(3);

        let result: Result<(), Failure> = policy
            .execute_with_retry(
                move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err(Failure::Timeout("still waiting".into()))
                    }
                },
                "test:retry",
                true,
            )
            .await;

        match result.unwrap_err() {
            Failure::Timeout(message) => assert_eq!(message, "still waiting"),
            other => panic!("unexpected failure: {other}"),
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovery_mid_loop_returns_the_value() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let policy = fast_policy(3);

        let result = policy
            .execute_with_retry(
                move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        if counter.fetch_add(1, Ordering::SeqCst) < 1 {
                            Err(Failure::Timeout("first try".into()))
                        } else {
                            Ok(42)
                        }
                    }
                },
                "test:retry",
                true,
            )
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
