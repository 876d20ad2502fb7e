//! Retry bookkeeping and exponential backoff
//!
//! The controller only looks at `retryable` and the attempt counter; it
//! never cares which kind of failure it was.

use std::time::Duration;

use crate::classify::classify;
use crate::error::GatewayError;

/// Max automatic retries per operation
pub const MAX_ATTEMPTS: u32 = 3;
/// Base delay for exponential backoff
pub const BASE_DELAY: Duration = Duration::from_millis(500);
/// Upper bound on a single backoff delay
pub const MAX_DELAY: Duration = Duration::from_secs(5);

/// The external call a retry would repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    ChangeSubscription,
}

/// Tunable backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// min(base * 2^attempt, cap)
    pub fn next_delay(&self, attempt_count: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt_count).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Retry only retryable failures, and only while attempts remain
pub fn should_retry(error: &GatewayError, attempt_count: u32, max_attempts: u32) -> bool {
    attempt_count < max_attempts && classify(error).retryable
}

/// What to do about a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-invoke the last operation once `delay` has elapsed
    Retry { delay: Duration },
    /// Surface the failure
    GiveUp,
}

/// Attempt tracking for the operation currently being driven
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub last_operation: Operation,
    /// Target of a pending change, kept so a retry sets the same id
    pub pending_subscription_id: Option<String>,
}

impl RetryContext {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt_count: 0,
            max_attempts,
            last_operation: Operation::Load,
            pending_subscription_id: None,
        }
    }

    /// Start driving a fresh operation
    pub fn begin(&mut self, operation: Operation, pending_subscription_id: Option<String>) {
        self.attempt_count = 0;
        self.last_operation = operation;
        self.pending_subscription_id = pending_subscription_id;
    }

    /// Count a failure and decide whether to back off and try again
    pub fn record_failure(&mut self, error: &GatewayError, policy: &RetryPolicy) -> RetryDecision {
        if !should_retry(error, self.attempt_count, self.max_attempts) {
            return RetryDecision::GiveUp;
        }
        let delay = policy.next_delay(self.attempt_count);
        self.attempt_count += 1;
        RetryDecision::Retry { delay }
    }

    pub fn attempts_remaining(&self) -> bool {
        self.attempt_count < self.max_attempts
    }

    /// Back to zero after a success or explicit navigation
    pub fn reset(&mut self) {
        self.attempt_count = 0;
        self.pending_subscription_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout() -> GatewayError {
        GatewayError::ExecutionFailed {
            tool: "az".into(),
            status: "exit status: 1".into(),
            stderr: "network timeout".into(),
        }
    }

    fn auth() -> GatewayError {
        GatewayError::ExecutionFailed {
            tool: "az".into(),
            status: "exit status: 1".into(),
            stderr: "authentication failed".into(),
        }
    }

    #[test]
    fn test_should_retry_respects_limit() {
        assert!(should_retry(&timeout(), 0, 3));
        assert!(should_retry(&timeout(), 2, 3));
        assert!(!should_retry(&timeout(), 3, 3));
        assert!(!should_retry(&timeout(), 7, 3));
        assert!(!should_retry(&timeout(), 0, 0));
    }

    #[test]
    fn test_should_retry_rejects_non_retryable() {
        for attempt in 0..5 {
            assert!(!should_retry(&auth(), attempt, 10));
        }
        assert!(!should_retry(&GatewayError::ToolNotFound { tool: "az".into() }, 0, 3));
    }

    #[test]
    fn test_default_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(0), Duration::from_millis(500));
        assert_eq!(policy.next_delay(1), Duration::from_secs(1));
        assert_eq!(policy.next_delay(2), Duration::from_secs(2));
        assert_eq!(policy.next_delay(3), Duration::from_secs(4));
        assert_eq!(policy.next_delay(4), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_monotonic_and_capped() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..80 {
            let delay = policy.next_delay(attempt);
            assert!(delay >= previous, "attempt {}", attempt);
            assert!(delay <= policy.max_delay, "attempt {}", attempt);
            previous = delay;
        }
    }

    #[test]
    fn test_record_failure_counts_up_to_max() {
        let policy = RetryPolicy::default();
        let mut ctx = RetryContext::new(3);
        ctx.begin(Operation::Load, None);

        let delays: Vec<_> = (0..4).map(|_| ctx.record_failure(&timeout(), &policy)).collect();
        assert_eq!(delays[0], RetryDecision::Retry { delay: Duration::from_millis(500) });
        assert_eq!(delays[1], RetryDecision::Retry { delay: Duration::from_secs(1) });
        assert_eq!(delays[2], RetryDecision::Retry { delay: Duration::from_secs(2) });
        assert_eq!(delays[3], RetryDecision::GiveUp);
        assert_eq!(ctx.attempt_count, 3);
        assert!(!ctx.attempts_remaining());
    }

    #[test]
    fn test_non_retryable_does_not_count() {
        let mut ctx = RetryContext::new(3);
        assert_eq!(ctx.record_failure(&auth(), &RetryPolicy::default()), RetryDecision::GiveUp);
        assert_eq!(ctx.attempt_count, 0);
    }

    #[test]
    fn test_reset_clears_pending() {
        let mut ctx = RetryContext::new(3);
        ctx.begin(Operation::ChangeSubscription, Some("sub-2".into()));
        ctx.record_failure(&timeout(), &RetryPolicy::default());
        ctx.reset();
        assert_eq!(ctx.attempt_count, 0);
        assert_eq!(ctx.pending_subscription_id, None);
        assert_eq!(ctx.last_operation, Operation::ChangeSubscription);
    }
}
