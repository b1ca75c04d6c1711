//! Retry-delay schedules.
//!
//! §4.3 and §4.6 name exact, fixed retry-delay sequences rather than a
//! generic exponential backoff, so unlike the teacher's open-ended
//! `get_backoff_iter`, a [`RetrySchedule`] is a fixed, named list of
//! [`Duration`]s consumed by index (`retry_count`).

use std::time::Duration;

/// A fixed sequence of retry delays. `delay(attempt)` returns `None` once
/// the schedule is exhausted, signaling the caller should give up.
#[derive(Clone, Copy, Debug)]
pub struct RetrySchedule(&'static [Duration]);

impl RetrySchedule {
    pub const fn new(delays: &'static [Duration]) -> Self {
        Self(delays)
    }

    pub fn max_retries(&self) -> usize {
        self.0.len()
    }

    /// `attempt` is zero-indexed: the delay to wait *before* retry number
    /// `attempt + 1`.
    pub fn delay(&self, attempt: usize) -> Option<Duration> {
        self.0.get(attempt).copied()
    }
}

/// C3's `transfer_token`/`ensure_ata` retry policy: up to 3 retries,
/// `[1s, 2s, 4s]`.
pub const CHAIN_SUBMIT: RetrySchedule = RetrySchedule::new(&[
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
]);

/// The `wait_confirmation` ad-hoc job's retry policy: up to 5 retries,
/// `[10, 30, 60, 120, 300]s`.
pub const WAIT_CONFIRMATION: RetrySchedule = RetrySchedule::new(&[
    Duration::from_secs(10),
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(120),
    Duration::from_secs(300),
]);

/// The `rotate_keys` ad-hoc job's retry policy: up to 3 retries,
/// `[60, 300, 900]s`.
pub const ROTATE_KEYS: RetrySchedule = RetrySchedule::new(&[
    Duration::from_secs(60),
    Duration::from_secs(300),
    Duration::from_secs(900),
]);

/// Errors whose message indicates a retryable chain-client condition per
/// §4.3: anything naming a blockhash, timeout, rate limit, connection, or
/// network issue. Validation and insufficient-balance errors are never
/// retryable.
pub fn is_retryable_chain_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    ["blockhash", "timeout", "rate limit", "connection", "network"]
        .iter()
        .any(|needle| lower.contains(needle))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chain_submit_has_three_delays() {
        assert_eq!(CHAIN_SUBMIT.max_retries(), 3);
        assert_eq!(CHAIN_SUBMIT.delay(0), Some(Duration::from_secs(1)));
        assert_eq!(CHAIN_SUBMIT.delay(2), Some(Duration::from_secs(4)));
        assert_eq!(CHAIN_SUBMIT.delay(3), None);
    }

    #[test]
    fn classifies_retryable_messages() {
        assert!(is_retryable_chain_error("blockhash not found"));
        assert!(is_retryable_chain_error("Request TIMEOUT after 30s"));
        assert!(is_retryable_chain_error("rate limit exceeded"));
        assert!(is_retryable_chain_error("connection reset by peer"));
        assert!(is_retryable_chain_error("network unreachable"));
    }

    #[test]
    fn does_not_retry_validation_or_balance_errors() {
        assert!(!is_retryable_chain_error("ValidationException: bad amount"));
        assert!(!is_retryable_chain_error("insufficient balance"));
        assert!(!is_retryable_chain_error("custom program error: 0x1"));
    }
}
