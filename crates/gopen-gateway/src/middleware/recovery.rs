//! Panic recovery around the downstream pipeline.

use crate::error::GatewayError;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Catches any panic from the downstream handlers and surfaces it as a
/// `Panic` error. The panic detail is logged, never leaked verbatim into
/// the response body.
pub async fn catch_panics<F, T>(future: F) -> Result<T, GatewayError>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(value) => Ok(value),
        Err(panic) => {
            let detail = if let Some(message) = panic.downcast_ref::<&str>() {
                message.to_string()
            } else if let Some(message) = panic.downcast_ref::<String>() {
                message.clone()
            } else {
                "unknown panic".to_string()
            };
            tracing::error!(panic = %detail, "Recovered from panic in request pipeline");
            Err(GatewayError::panic("Unexpected internal error"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_passes_values_through() {
        let result = catch_panics(async { "ok" }).await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_recovers_and_hides_panic_detail() {
        let result: Result<(), _> = catch_panics(async {
            panic!("secret internal state: {}", 42);
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Panic);
        assert_eq!(err.status_code(), 500);
        assert!(!err.message.contains("secret"));
    }
}
