//! Retry policy for writes that race other writers on the same database file

use crate::Result;
use std::future::Future;
use std::time::Duration;
use tabshelf_config::RetryConfig;

/// Linear backoff on lock contention: attempt `n` that fails with a lock
/// error waits `base_delay * n` before attempt `n + 1`. Every other error,
/// and the last failed attempt, is returned unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after the given failed attempt (1-indexed)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `action` until it succeeds, fails with a non-lock error, or the
    /// attempts run out.
    ///
    /// The action's future is dropped before sleeping, so no connection is
    /// held across the backoff.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut action: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match action().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_lock_contention() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Database locked, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_lock_contention() {
                        tracing::error!(operation, attempts = attempt, "Database still locked, giving up");
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(50))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records the virtual time of every call and fails the first `failures`
    /// calls with the error produced by `make_err`.
    struct FlakyStore {
        calls: Mutex<Vec<Instant>>,
        failures: usize,
        make_err: fn() -> StorageError,
    }

    impl FlakyStore {
        fn new(failures: usize, make_err: fn() -> StorageError) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failures,
                make_err,
            }
        }

        async fn write(&self) -> Result<u32> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Instant::now());
            if calls.len() <= self.failures {
                Err((self.make_err)())
            } else {
                Ok(calls.len() as u32)
            }
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    fn assert_close(actual: Duration, expected: Duration) {
        assert!(
            actual >= expected && actual < expected + Duration::from_millis(5),
            "expected ~{expected:?}, got {actual:?}"
        );
    }

    fn locked() -> StorageError {
        StorageError::Locked(sqlx::Error::Protocol("database is locked".into()))
    }

    fn constraint() -> StorageError {
        StorageError::SchemaViolation("NOT NULL constraint failed".into())
    }

    #[test]
    fn test_default_matches_linear_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        let delays: Vec<_> = (1..policy.max_attempts())
            .map(|attempt| policy.delay_for(attempt).as_millis())
            .collect();
        assert_eq!(delays, vec![50, 100, 150, 200]);
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_fifth_attempt() {
        let store = FlakyStore::new(4, locked);
        let started = Instant::now();

        let result = RetryPolicy::default().run("write", || store.write()).await;

        assert_eq!(result.unwrap(), 5);
        let gaps = store.gaps();
        assert_eq!(gaps.len(), 4);
        for (gap, expected_ms) in gaps.iter().zip([50u64, 100, 150, 200]) {
            assert_close(*gap, Duration::from_millis(expected_ms));
        }
        assert_close(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let store = FlakyStore::new(usize::MAX, locked);

        let result = RetryPolicy::default().run("write", || store.write()).await;

        assert!(result.unwrap_err().is_lock_contention());
        assert_eq!(store.calls.lock().unwrap().len(), 5);
        assert_eq!(store.gaps().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_bypass_retry() {
        let store = FlakyStore::new(1, constraint);
        let started = Instant::now();

        let result = RetryPolicy::default().run("write", || store.write()).await;

        assert!(matches!(result, Err(StorageError::SchemaViolation(_))));
        assert_eq!(store.calls.lock().unwrap().len(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
