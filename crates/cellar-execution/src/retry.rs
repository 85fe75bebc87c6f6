use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{Disposition, Error};

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    4_000
}

/// Bounded exponential backoff applied to errors classified as [`Disposition::Retry`].
/// Backoffs are in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

impl RetryPolicy {
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the attempt following `attempt`, counting from 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_backoff.saturating_mul(factor).min(self.max_backoff);

        Duration::from_millis(delay)
    }

    /// Runs `operation` until it succeeds, fails with an error that is not retryable, or the
    /// attempts are exhausted. Every attempt calls `operation` again from scratch.
    pub async fn retry<T, F, Fut>(&self, mut operation: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Err(e) if e.disposition() == Disposition::Retry && attempt < self.max_attempts => {
                    let backoff = self.backoff(attempt);
                    warn!(attempt, backoff = backoff.as_millis() as u64, message = %e, "retrying");

                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                },
                result => return result,
            }
        }
    }
}
