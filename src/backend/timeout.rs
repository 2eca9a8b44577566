//! Deadline for remote calls
//!
//! Some transports never report failure on their own (a server that accepts
//! the connection and stays silent). Every remote call goes through
//! [`with_timeout`] so it resolves exactly once, either with its result or
//! with [`BackendError::Timeout`].

use crate::backend::error::{BackendError, BackendResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn timeout_message(timeout: Duration) -> String {
    format!(
        "Request Error: Backend did not respond after {} seconds",
        timeout.as_secs_f64()
    )
}

pub async fn with_timeout<T, F>(timeout: Duration, operation: F) -> BackendResult<T>
where
    F: Future<Output = BackendResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => {
            let message = timeout_message(timeout);
            warn!(timeout_secs = timeout.as_secs_f64(), "{}", message);
            Err(BackendError::Timeout { message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_format() {
        assert_eq!(
            timeout_message(DEFAULT_TIMEOUT),
            "Request Error: Backend did not respond after 5 seconds"
        );
        assert_eq!(
            timeout_message(Duration::from_millis(250)),
            "Request Error: Backend did not respond after 0.25 seconds"
        );
    }

    #[tokio::test]
    async fn test_silent_operation_times_out() {
        let result: BackendResult<()> =
            with_timeout(Duration::from_millis(20), std::future::pending()).await;
        match result {
            Err(BackendError::Timeout { message }) => assert!(message.contains("0.02 seconds")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fast_operation_passes_through() {
        let result = with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
