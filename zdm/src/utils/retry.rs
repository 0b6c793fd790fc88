//! Fixed-delay retry for destination calls
//!
//! Unlike an exponential backoff, every failed attempt waits the same
//! configured delay before the next one.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Run `operation` up to `max_attempts` times with `delay` between attempts.
///
/// Returns the first success, or the error of the final attempt.
pub async fn retry_fixed<F, Fut, T, E>(
    operation_name: &str,
    max_attempts: u32,
    delay: Duration,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        tracing::debug!(operation = operation_name, attempt, max_attempts, "Attempt");

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if attempt < max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    delay_secs = delay.as_secs_f64(),
                    error = %err,
                    "Attempt failed, will retry after delay"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                tracing::error!(
                    operation = operation_name,
                    attempt,
                    error = %err,
                    "Operation failed: retries exhausted"
                );
                return Err(err);
            }
        }
    }
}
