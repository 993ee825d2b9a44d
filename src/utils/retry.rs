// Retry utilities

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// How many times to attempt an operation and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Two attempts back to back.
    pub const ONCE_IMMEDIATE: RetryPolicy = RetryPolicy {
        max_attempts: 2,
        delay: Duration::ZERO,
    };
}

/// Run `operation` until it succeeds, the error is not retryable, or the
/// attempts run out. The last error is returned.
pub async fn with_retry<F, Fut, T, E, P>(
    policy: RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt >= policy.max_attempts || !is_retryable(&error) {
                    return Err(error);
                }
                warn!(attempt, error = %error, "Retrying after transient failure");

                if !policy.delay.is_zero() {
                    sleep(policy.delay).await;
                }
                attempt += 1;
            }
        }
    }
}
