//! Wraps a callable so transient failures are retried with exponential
//! backoff plus jitter.
//!
//! Grounded directly on the original retry algorithm: attempt counting,
//! `delay = retry_delay * 2^attempt`, `jitter = delay * jitter_factor *
//! rng()`, success/failure callbacks fired exactly once with callback
//! errors logged and swallowed, and a human-readable elapsed-time log line
//! on success.

use flowerpower_config::RetryPolicy;
use flowerpower_core::error_kind;
use flowerpower_core::time::humanize;
use flowerpower_core::Classify;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

type SyncRng = Arc<dyn Fn() -> f64 + Send + Sync>;
type SyncSleep = Arc<dyn Fn(Duration) + Send + Sync>;

/// Executes operations under a `RetryPolicy`, synchronously or async.
///
/// `rng` and the sync `sleep` hook are injectable so tests can run
/// deterministically without real delays, mirroring the source's
/// injectable `sleep`/`rng` callables.
#[derive(Clone)]
pub struct RetryManager {
    policy: RetryPolicy,
    rng: SyncRng,
    sleep_sync: SyncSleep,
}

impl RetryManager {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            rng: Arc::new(rand::random::<f64>),
            sleep_sync: Arc::new(std::thread::sleep),
        }
    }

    pub fn with_rng(mut self, rng: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        self.rng = Arc::new(rng);
        self
    }

    pub fn with_sync_sleep(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep_sync = Arc::new(sleep);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.policy.retry_delay * 2f64.powi(attempt as i32);
        let jitter = base * self.policy.jitter_factor * (self.rng)();
        Duration::from_secs_f64((base + jitter).max(0.0))
    }

    /// Runs `operation` synchronously, retrying on retryable errors.
    ///
    /// `on_success`/`on_failure` are invoked exactly once, for the
    /// terminal outcome only; a callback returning `Err` is logged and
    /// swallowed, never altering the returned result.
    pub fn execute<T, E, Op, OnSuccess, OnFailure>(
        &self,
        context_name: &str,
        mut operation: Op,
        mut on_success: OnSuccess,
        mut on_failure: OnFailure,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Result<T, E>,
        OnSuccess: FnMut(&T) -> Result<(), anyhow::Error>,
        OnFailure: FnMut(&E) -> Result<(), anyhow::Error>,
        E: Classify + std::fmt::Display,
    {
        let start = Instant::now();
        let mut attempt = 0u32;
        loop {
            match operation() {
                Ok(result) => {
                    tracing::info!(
                        context = context_name,
                        attempt,
                        elapsed = %humanize(start.elapsed()),
                        "operation succeeded"
                    );
                    invoke_fallible(&mut on_success, &result, "on_success");
                    return Ok(result);
                }
                Err(err) => {
                    let kind = err.kind();
                    let retryable = error_kind::matches(&self.policy.retry_exceptions, &kind);
                    if !retryable || attempt >= self.policy.max_retries {
                        tracing::error!(
                            context = context_name,
                            attempt,
                            error = %err,
                            "operation failed, exhausting retries"
                        );
                        invoke_fallible(&mut on_failure, &err, "on_failure");
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        context = context_name,
                        attempt,
                        delay = %humanize(delay),
                        error = %err,
                        "operation failed, retrying"
                    );
                    (self.sleep_sync)(delay);
                    attempt += 1;
                }
            }
        }
    }

    /// Async counterpart of `execute`; uses `tokio::time::sleep` so the
    /// task yields instead of blocking the runtime between attempts.
    pub async fn execute_async<T, E, Op, Fut, OnSuccess, OnFailure>(
        &self,
        context_name: &str,
        mut operation: Op,
        mut on_success: OnSuccess,
        mut on_failure: OnFailure,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        OnSuccess: FnMut(&T) -> Result<(), anyhow::Error>,
        OnFailure: FnMut(&E) -> Result<(), anyhow::Error>,
        E: Classify + std::fmt::Display,
    {
        let start = Instant::now();
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(result) => {
                    tracing::info!(
                        context = context_name,
                        attempt,
                        elapsed = %humanize(start.elapsed()),
                        "operation succeeded"
                    );
                    invoke_fallible(&mut on_success, &result, "on_success");
                    return Ok(result);
                }
                Err(err) => {
                    let kind = err.kind();
                    let retryable = error_kind::matches(&self.policy.retry_exceptions, &kind);
                    if !retryable || attempt >= self.policy.max_retries {
                        tracing::error!(
                            context = context_name,
                            attempt,
                            error = %err,
                            "operation failed, exhausting retries"
                        );
                        invoke_fallible(&mut on_failure, &err, "on_failure");
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        context = context_name,
                        attempt,
                        delay = %humanize(delay),
                        error = %err,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn invoke_fallible<A>(callback: &mut impl FnMut(&A) -> Result<(), anyhow::Error>, arg: &A, name: &str) {
    if let Err(err) = callback(arg) {
        tracing::warn!(callback = name, error = %err, "callback failed, ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowerpower_core::ErrorKind;
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[derive(Debug)]
    struct TransientError(String);

    impl std::fmt::Display for TransientError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Classify for TransientError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Timeout
        }
    }

    fn no_sleep_manager(policy: RetryPolicy) -> RetryManager {
        RetryManager::new(policy)
            .with_rng(|| 0.0)
            .with_sync_sleep(|_| {})
    }

    #[test]
    fn succeeds_on_third_attempt_invokes_success_once() {
        let mut retry_exceptions = HashSet::new();
        retry_exceptions.insert(ErrorKind::Timeout);
        let policy = RetryPolicy {
            max_retries: 3,
            retry_delay: 0.01,
            jitter_factor: 0.0,
            retry_exceptions,
        };
        let manager = no_sleep_manager(policy);

        let calls = RefCell::new(0);
        let success_calls = RefCell::new(0);
        let failure_calls = RefCell::new(0);

        let result = manager.execute(
            "s2",
            || {
                let mut n = calls.borrow_mut();
                *n += 1;
                if *n < 3 {
                    Err(TransientError("transient".to_string()))
                } else {
                    Ok("ok".to_string())
                }
            },
            |_result| {
                *success_calls.borrow_mut() += 1;
                Ok(())
            },
            |_err| {
                *failure_calls.borrow_mut() += 1;
                Ok(())
            },
        );

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(*calls.borrow(), 3);
        assert_eq!(*success_calls.borrow(), 1);
        assert_eq!(*failure_calls.borrow(), 0);
    }

    #[test]
    fn exhausts_retries_invokes_failure_once() {
        let policy = RetryPolicy {
            max_retries: 2,
            retry_delay: 0.01,
            jitter_factor: 0.0,
            retry_exceptions: {
                let mut set = HashSet::new();
                set.insert(ErrorKind::Timeout);
                set
            },
        };
        let manager = no_sleep_manager(policy);

        let calls = RefCell::new(0);
        let failure_calls = RefCell::new(0);

        let result: Result<String, TransientError> = manager.execute(
            "s3",
            || {
                *calls.borrow_mut() += 1;
                Err(TransientError("always fails".to_string()))
            },
            |_result| Ok(()),
            |_err| {
                *failure_calls.borrow_mut() += 1;
                Ok(())
            },
        );

        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 3);
        assert_eq!(*failure_calls.borrow(), 1);
    }

    #[test]
    fn max_retries_zero_runs_exactly_once() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let manager = no_sleep_manager(policy);
        let calls = RefCell::new(0);

        let result: Result<(), TransientError> = manager.execute(
            "boundary",
            || {
                *calls.borrow_mut() += 1;
                Err(TransientError("nope".to_string()))
            },
            |_| Ok(()),
            |_| Ok(()),
        );

        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn non_retryable_error_kind_fails_immediately() {
        let mut retry_exceptions = HashSet::new();
        retry_exceptions.insert(ErrorKind::Connection);
        let policy = RetryPolicy {
            max_retries: 5,
            retry_delay: 0.01,
            jitter_factor: 0.0,
            retry_exceptions,
        };
        let manager = no_sleep_manager(policy);
        let calls = RefCell::new(0);

        let result: Result<(), TransientError> = manager.execute(
            "mismatched-kind",
            || {
                *calls.borrow_mut() += 1;
                Err(TransientError("timeout, not connection".to_string()))
            },
            |_| Ok(()),
            |_| Ok(()),
        );

        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn async_variant_retries_and_succeeds() {
        let mut retry_exceptions = HashSet::new();
        retry_exceptions.insert(ErrorKind::Timeout);
        let policy = RetryPolicy {
            max_retries: 3,
            retry_delay: 0.0,
            jitter_factor: 0.0,
            retry_exceptions,
        };
        let manager = no_sleep_manager(policy);
        let calls = RefCell::new(0);

        let result = manager
            .execute_async(
                "async-s2",
                || {
                    let mut n = calls.borrow_mut();
                    *n += 1;
                    let attempt = *n;
                    async move {
                        if attempt < 2 {
                            Err(TransientError("transient".to_string()))
                        } else {
                            Ok(42)
                        }
                    }
                },
                |_| Ok(()),
                |_| Ok(()),
            )
            .await;

        assert_eq!(result.unwrap(), 42);
    }
}
