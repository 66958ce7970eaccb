//! Per-request deadline enforcement.

use crate::error::GatewayError;
use std::future::Future;
use std::time::Duration;

/// Bounds the downstream pipeline with the endpoint deadline. On expiry
/// the inner future is dropped, cancelling in-flight transport and store
/// calls, and a `Timeout` error is returned for the 504 writer.
pub async fn with_deadline<F, T>(deadline: Duration, future: F) -> Result<T, GatewayError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| GatewayError::timeout())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let result = with_deadline(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_maps_to_timeout_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            42
        };
        let result = with_deadline(Duration::from_secs(1), slow).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.status_code(), 504);
    }
}
