use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::warn;

/// Bounded retry with a linearly growing delay: the n-th retry waits `n * step`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retries: usize,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            step: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: usize, step: Duration) -> Self {
        Self { retries, step }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> + use<> {
        let step = self.step;
        (1..=self.retries as u32).map(move |attempt| step * attempt)
    }

    /// Runs `action` until it succeeds, `should_retry` declines the error, or
    /// the retries are exhausted. The last error is returned.
    pub async fn run<T, E, A, Fut, C>(
        &self,
        label: &str,
        action: A,
        mut should_retry: C,
    ) -> Result<T, E>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: FnMut(&E) -> bool,
        E: Display,
    {
        let retries = self.retries;
        let mut attempt = 0usize;
        RetryIf::spawn(self.strategy(), action, |e: &E| {
            attempt += 1;
            let retry = should_retry(e);
            if retry && attempt <= retries {
                warn!("{} failed: {}, retry attempt {}/{}", label, e, attempt, retries);
            }
            retry
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_strategy_is_linear_and_bounded() {
        let policy = RetryPolicy::new(3, Duration::from_secs(4));
        let delays: Vec<_> = policy.strategy().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(12)
            ]
        );
        assert_eq!(RetryPolicy::none().strategy().count(), 0);
    }

    #[tokio::test]
    async fn test_retryable_error_exhausts_attempts() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result: Result<(), String> = policy
            .run(
                "flaky call",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("boom".to_string())
                },
                |_| true,
            )
            .await;

        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result: Result<(), String> = policy
            .run(
                "fatal call",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("bad input".to_string())
                },
                |_| false,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result: Result<usize, String> = policy
            .run(
                "recovering call",
                move || async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 { Err("transient".to_string()) } else { Ok(n) }
                },
                |_| true,
            )
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
