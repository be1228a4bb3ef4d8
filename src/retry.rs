// src/retry.rs

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::cancel::CancellationFlag;
use crate::error::EtlError;

/// Marks which failures are worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: StdError + 'static,
{
    #[error("gave up after {attempts} attempt(s): {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    #[error("non-retryable failure on attempt {attempts}: {source}")]
    Permanent {
        attempts: u32,
        #[source]
        source: E,
    },

    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E>
where
    E: StdError + 'static,
{
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::Permanent { attempts, .. }
            | RetryError::Cancelled { attempts } => *attempts,
        }
    }

    /// The last underlying failure, if the operation ever ran to one.
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::Permanent { source, .. } => {
                Some(source)
            }
            RetryError::Cancelled { .. } => None,
        }
    }
}

/// Bounded retry with a constant pause between attempts.
///
/// `max_retries` is the total number of calls, so `1` means "try once".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

    pub fn new(max_retries: u32, retry_delay: Duration) -> Result<Self, EtlError> {
        if max_retries == 0 {
            return Err(EtlError::InvalidInput(
                "max_retries must be at least 1".into(),
            ));
        }
        Ok(RetryPolicy {
            max_retries,
            retry_delay,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Runs `operation` until it succeeds, fails permanently, runs out of attempts,
    /// or `cancel` is raised before the next pause.
    pub async fn execute<T, E, F, Fut>(
        &self,
        mut operation: F,
        cancel: &CancellationFlag,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + Retryable + 'static,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let error = match operation().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(attempts, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                debug!(attempts, error = %error, "non-retryable failure");
                return Err(RetryError::Permanent {
                    attempts,
                    source: error,
                });
            }

            if attempts >= self.max_retries {
                return Err(RetryError::Exhausted {
                    attempts,
                    source: error,
                });
            }

            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled { attempts });
            }

            warn!(
                attempt = attempts,
                max_retries = self.max_retries,
                delay_ms = self.retry_delay.as_millis() as u64,
                error = %error,
                "retrying after failure"
            );
            sleep(self.retry_delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
        }
    }
}
