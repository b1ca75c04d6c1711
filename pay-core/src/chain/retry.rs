//! Bounded retry for `transfer_token`/`ensure_ata` submission, per §4.3:
//! up to 3 retries with delays `[1s, 2s, 4s]`, only for errors whose
//! message names a blockhash, timeout, rate-limit, connection, or network
//! condition. Validation and insufficient-balance errors never retry.

use std::fmt::Display;
use std::future::Future;

use pay_common::backoff::{is_retryable_chain_error, RetrySchedule, CHAIN_SUBMIT};
use tracing::warn;

pub async fn with_retry<T, E, F, Fut>(operation: &'static str, mut attempt: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_schedule(operation, CHAIN_SUBMIT, &mut attempt).await
}

async fn with_schedule<T, E, F, Fut>(
    operation: &'static str,
    schedule: RetrySchedule,
    attempt: &mut F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut tried = 0usize;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let message = e.to_string();
                let Some(delay) = (is_retryable_chain_error(&message)
                    .then(|| schedule.delay(tried))
                    .flatten())
                else {
                    return Err(e);
                };
                tried += 1;
                warn!(operation, attempt = tried, delay_ms = delay.as_millis() as u64, "retrying after chain error: {message}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::cell::Cell;

    use super::*;

    #[derive(Debug)]
    struct Failing(&'static str);
    impl Display for Failing {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let attempts = Cell::new(0);
        let result: Result<&str, Failing> = with_retry("test", || {
            attempts.set(attempts.get() + 1);
            async move {
                if attempts.get() < 3 {
                    Err(Failing("blockhash not found"))
                } else {
                    Ok("submitted")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "submitted");
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_transient_errors() {
        let attempts = Cell::new(0);
        let result: Result<&str, Failing> = with_retry("test", || {
            attempts.set(attempts.get() + 1);
            async move { Err(Failing("insufficient balance")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_schedule_is_exhausted() {
        let attempts = Cell::new(0);
        let result: Result<&str, Failing> = with_retry("test", || {
            attempts.set(attempts.get() + 1);
            async move { Err(Failing("connection reset")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.get(), 4); // initial attempt + 3 retries
    }
}
