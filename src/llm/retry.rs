//! Bounded retry and deadline helpers for model calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run `fut` with a deadline; an elapsed deadline becomes `Error::Timeout`.
pub async fn with_timeout<T, F>(duration: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(duration)),
    }
}

/// Run `op` up to `n` times until it yields a value.
///
/// Empty results and retryable errors (generation, validation, timeout)
/// trigger another attempt; once attempts are exhausted the result is
/// `Ok(None)`. Any other error is returned immediately.
pub async fn retry_n_times<T, F, Fut>(n: u32, mut op: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let attempts = n.max(1);
    for attempt in 1..=attempts {
        match op().await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {
                tracing::warn!("Attempt {}/{} returned no result", attempt, attempts);
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
            }
            Err(e) => return Err(e),
        }
    }
    tracing::error!("Giving up after {} attempt(s)", attempts);
    Ok(None)
}
