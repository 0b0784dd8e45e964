//! Lock-contention retry logic.
//!
//! Write paths open `BEGIN IMMEDIATE` transactions. When another connection
//! holds the write lock past the busy timeout, `SQLite` reports the database
//! as locked; the whole operation is then re-run from the start with capped
//! exponential backoff. Constraint and validation failures are never retried.

use std::future::Future;
use std::time::Duration;

use sift_config::RetrySettings;

use crate::error::EngineError;

/// Configuration for retry behavior on lock contention.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: settings.base_delay(),
            max_delay: settings.max_delay(),
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Detect `SQLITE_BUSY` / `SQLITE_LOCKED` from the error message.
///
/// The predicate is narrow so genuine SQL or constraint errors are not retried.
pub fn is_busy_error(e: &libsql::Error) -> bool {
    let msg = e.to_string();
    msg.contains("database is locked")
        || msg.contains("database table is locked")
        || msg.contains("database is busy")
}

/// Run `op` until it succeeds, fails with a non-busy error, or attempts run out.
pub(crate) async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    name: &str,
    mut op: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_busy() && attempt < config.max_attempts => {
                let delay = config.delay_for(attempt);
                tracing::debug!(
                    operation = name,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "database busy, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::DatabaseError;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_millis(150),
        };
        assert_eq!(config.delay_for(1), Duration::from_millis(25));
        assert_eq!(config.delay_for(2), Duration::from_millis(50));
        assert_eq!(config.delay_for(3), Duration::from_millis(100));
        assert_eq!(config.delay_for(4), Duration::from_millis(150));
        assert_eq!(config.delay_for(40), Duration::from_millis(150));
    }

    #[tokio::test]
    async fn non_busy_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), EngineError> = with_retry(&RetryConfig::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::Database(DatabaseError::NoResult)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_returns_immediately() {
        let value = with_retry(&RetryConfig::default(), "test", || async {
            Ok::<_, EngineError>(7)
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
    }
}
