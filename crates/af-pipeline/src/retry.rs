//! Bounded retry with exponential backoff for outbound remote calls.

use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::error::{PipelineError, Result};

/// Run `op` up to `max_attempts` times, sleeping
/// `initial_delay * 2^attempt` between attempts.
///
/// Returns the first success, or the error from the final attempt.
pub async fn retry_with_backoff<T, F, Fut>(
    mut op: F,
    max_attempts: u32,
    initial_delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = initial_delay;
    let mut last_error = None;

    for attempt in 0..max_attempts.max(1) {
        if attempt > 0 {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(
                    "attempt {}/{} failed: {err}",
                    attempt + 1,
                    max_attempts.max(1)
                );
                last_error = Some(err);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| PipelineError::Remote("retry made no attempts".into())))
}
