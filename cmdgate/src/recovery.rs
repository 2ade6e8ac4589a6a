//! Bounded retry around a fallible pipeline operation.

use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{PipelineError, RecoveryError};

/// Retries after the first attempt; up to `MAX_RETRIES + 1` calls in total.
pub const MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Whether another attempt follows the failed zero-based `attempt`.
pub fn should_retry(attempt: u32) -> bool {
    attempt < MAX_RETRIES
}

/// Delay before the one-based attempt `attempt`.
///
/// Attempt 1 runs immediately; attempt `k >= 2` waits
/// `min(base * 2^(k-2), max)`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt < 2 {
        return Duration::ZERO;
    }
    let factor = 2u32.checked_pow(attempt - 2).unwrap_or(u32::MAX);
    base.checked_mul(factor).map_or(max, |delay| delay.min(max))
}

/// Blocking wait between attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy)]
enum Delay {
    Fixed(Duration),
    Backoff { base: Duration, max: Duration },
}

impl Delay {
    fn before(self, attempt: u32) -> Duration {
        match self {
            Delay::Fixed(delay) => delay,
            Delay::Backoff { base, max } => backoff_delay(attempt, base, max),
        }
    }
}

pub struct FailureRecovery {
    retry_delay: Duration,
    sleeper: Box<dyn Sleeper>,
}

impl fmt::Debug for FailureRecovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureRecovery")
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl Default for FailureRecovery {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureRecovery {
    pub fn new() -> Self {
        Self::with_sleeper(DEFAULT_RETRY_DELAY, Box::new(ThreadSleeper))
    }

    pub fn with_sleeper(retry_delay: Duration, sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            retry_delay,
            sleeper,
        }
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        should_retry(attempt)
    }

    /// Run `op` until it succeeds or attempts are exhausted, with a fixed delay.
    pub fn retry<T, F>(&self, op: F, description: &str) -> Result<T, PipelineError>
    where
        F: FnMut() -> Result<T, PipelineError>,
    {
        self.run(op, description, Delay::Fixed(self.retry_delay))
    }

    /// Like [`FailureRecovery::retry`] with exponential backoff capped at `max_delay`.
    pub fn retry_with_backoff<T, F>(
        &self,
        op: F,
        description: &str,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Result<T, PipelineError>,
    {
        self.run(
            op,
            description,
            Delay::Backoff {
                base: base_delay,
                max: max_delay,
            },
        )
    }

    fn run<T, F>(&self, mut op: F, description: &str, delay: Delay) -> Result<T, PipelineError>
    where
        F: FnMut() -> Result<T, PipelineError>,
    {
        let mut summaries = Vec::new();
        let mut attempt = 0u32;
        loop {
            let err = match op() {
                Ok(value) => {
                    if attempt > 0 {
                        info!(description, attempts = attempt + 1, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(err);
            }

            summaries.push(format!("Attempt {}: {}: {}", attempt + 1, err.kind(), err));
            if !should_retry(attempt) {
                return Err(RecoveryError {
                    description: description.to_string(),
                    attempts: attempt + 1,
                    log: summaries.join("\n"),
                    last: Box::new(err),
                }
                .into());
            }

            let wait = delay.before(attempt + 2);
            warn!(
                description,
                attempt = attempt + 1,
                kind = err.kind(),
                err = %err,
                wait_ms = wait.as_millis() as u64,
                "attempt failed, retrying"
            );
            self.sleeper.sleep(wait);
            attempt += 1;
        }
    }
}
