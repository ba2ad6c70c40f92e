//! Bounded waits for external calls
//!
//! Every call into a store carries an explicit deadline so a slow dependency
//! degrades the request instead of hanging it.

use crate::error::{CoreError, Result};
use std::future::Future;
use std::time::Duration;

/// Run a fallible store operation with a deadline.
///
/// Elapsed deadlines become [`CoreError::Timeout`] naming `operation`.
pub async fn with_timeout<T, F>(duration: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::timeout(format!(
            "{} exceeded {}ms",
            operation,
            duration.as_millis()
        ))),
    }
}
