//! Timeout helpers for oracle calls and other async operations.
//!
//! ```ignore
//! use crate::ai::timeout::with_timeout;
//!
//! let reply = with_timeout(
//!     Duration::from_secs(60),
//!     async { provider.generate(prompt, &schema).await },
//!     "oracle request",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::constants::oracle;
use crate::types::{NuplanError, Result};

/// Default oracle request timeout
pub fn default_oracle_timeout() -> Duration {
    Duration::from_secs(oracle::DEFAULT_TIMEOUT_SECS)
}

/// Execute a fallible async operation with a timeout.
///
/// Expiry yields `NuplanError::Timeout` naming `operation_name`.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(NuplanError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_oracle_timeout() {
        assert_eq!(default_oracle_timeout().as_secs(), 60);
    }

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, NuplanError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, NuplanError>(42)
            },
            "slow operation",
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, NuplanError::Timeout { .. }));
        assert!(err.is_oracle_unavailable());
    }
}
