//! Deadline enforcement.
//!
//! # Responsibilities
//! - Bound one transport attempt by its deadline
//! - Cancel the in-flight attempt cleanly when the deadline elapses
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the attempt future is dropped on expiry
//! - Deadline errors are distinct from other errors (`TransportError::DeadlineExceeded`)
//! - Deadlines apply per attempt, never cumulatively across retries

use std::future::Future;
use std::time::Duration;

use crate::transport::TransportError;

/// Run `attempt`, failing with `DeadlineExceeded` once `deadline` elapses.
///
/// With `None` the attempt is awaited without a bound.
pub async fn with_deadline<T, F>(deadline: Option<Duration>, attempt: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, attempt)
            .await
            .unwrap_or(Err(TransportError::DeadlineExceeded(limit))),
        None => attempt.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out() {
        let result: Result<(), _> = with_deadline(Some(Duration::from_millis(800)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(TransportError::DeadlineExceeded(d)) if d == Duration::from_millis(800)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_attempt_passes_through() {
        let result = with_deadline(Some(Duration::from_millis(800)), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, TransportError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_deadline_waits() {
        let result = with_deadline(None, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, TransportError>("done")
        })
        .await;
        assert_eq!(result.unwrap(), "done");
    }
}
