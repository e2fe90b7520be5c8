//! Timeouts, backoff and jitter for remote calls

pub mod timeout {
    //! Timeout configuration for external calls

    use std::future::Future;
    use std::time::Duration;

    use crate::{Error, Result};

    /// Default timeout for a remote command inside a node
    pub const REMOTE_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

    /// Default timeout for Redis operations
    pub const REDIS_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

    /// Run `fut`, turning expiry into [`Error::Timeout`]
    ///
    /// `what` names the operation in the error message.
    pub async fn with_timeout<T, F>(duration: Duration, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(duration, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "{what} did not finish within {}s",
                duration.as_secs_f64()
            ))),
        }
    }
}

pub mod backoff {
    //! Exponential backoff with an upper bound

    use rand::Rng;
    use std::time::Duration;

    /// Doubling delay between `initial` and `max`
    #[derive(Debug, Clone)]
    pub struct Backoff {
        initial: Duration,
        max: Duration,
        current: Duration,
    }

    impl Backoff {
        #[must_use]
        pub fn new(initial: Duration, max: Duration) -> Self {
            let initial = initial.min(max);
            Self {
                initial,
                max,
                current: initial,
            }
        }

        #[must_use]
        pub fn from_secs(initial_secs: u64, max_secs: u64) -> Self {
            Self::new(
                Duration::from_secs(initial_secs),
                Duration::from_secs(max_secs),
            )
        }

        /// Delay to wait now; the following call returns twice as much, capped
        pub fn next_delay(&mut self) -> Duration {
            let delay = self.current;
            self.current = (self.current * 2).min(self.max);
            delay
        }

        /// Start over after a healthy period
        pub fn reset(&mut self) {
            self.current = self.initial;
        }
    }

    /// `base` plus a uniformly random extra in `[0, jitter]`
    #[must_use]
    pub fn jittered(base: Duration, jitter: Duration) -> Duration {
        let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}
