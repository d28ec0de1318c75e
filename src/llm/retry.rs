use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::error::Result;

/// Run `operation` until it succeeds, retrying transient errors with exponential backoff
///
/// The delay before retry `n` (0-based) is `base_delay * 2^n`.
pub async fn retry_with_backoff<T, F, Fut>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = base_delay * 2u32.saturating_pow(attempt);
                warn!(
                    "Operation failed: {} - retrying in {:?} ({}/{})",
                    e,
                    delay,
                    attempt + 1,
                    max_retries
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt >= max_retries && e.is_retryable() {
                    error!("Operation failed after {} retries: {}", max_retries, e);
                }
                return Err(e);
            }
        }
    }
}
