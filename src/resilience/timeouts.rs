//! Deadline enforcement.
//!
//! # Responsibilities
//! - Bound every logical operation by a deadline
//! - Stop waiting (on a call or on a retry delay) once the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Dropping the inner future abandons the in-flight attempt; the request
//!   already on the wire is not recalled, and the breaker counts the
//!   abandoned attempt as a failure
//! - Timeout errors are distinct from dependency errors

use std::future::Future;
use std::time::Duration;

use crate::resilience::error::ResilienceError;

/// Run `fut` with a deadline, mapping expiry to `DeadlineExceeded`.
pub async fn with_deadline<F, T>(operation: &str, deadline: Duration, fut: F) -> Result<T, ResilienceError>
where
    F: Future<Output = Result<T, ResilienceError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, deadline = ?deadline, "Operation deadline exceeded");
            Err(ResilienceError::DeadlineExceeded {
                operation: operation.to_string(),
                deadline,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cuts_long_waits() {
        let result = with_deadline("generate_itinerary", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, ResilienceError>(())
        })
        .await;

        assert!(matches!(result, Err(ResilienceError::DeadlineExceeded { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_results_pass_through() {
        let result = with_deadline("generate_itinerary", Duration::from_secs(2), async { Ok::<_, ResilienceError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
