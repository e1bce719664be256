//! Bounded retries for operations refused with backpressure.
//!
//! The daemon answers `TryAgain` when its buffers are full. Callers that
//! prefer to wait rather than fail wrap the call in [`retry_on_try_again`].

use std::thread;
use std::time::Duration;

use corocfg_config::Config;
use tracing::{debug, warn};

use crate::errors::CfgError;

const RETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::retry");

/// Upper bound on any single backoff delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2);

/// Exponential backoff without jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_attempts(),
            base_delay: config.retry_delay(),
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Policy with the configured defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of attempts, the first included. Zero behaves as one.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the delay after the first failed attempt.
    #[must_use]
    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Caps every delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Attempts, the first included.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Delay after failed attempt `attempt` (zero-based): the base delay
    /// doubled per attempt, capped at the maximum.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1_u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are spent.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last retryable one once
/// every attempt has failed.
pub fn retry_on_try_again<T>(
    policy: &RetryPolicy,
    op: impl FnMut() -> Result<T, CfgError>,
) -> Result<T, CfgError> {
    retry_with_sleeper(policy, op, thread::sleep)
}

pub(crate) fn retry_with_sleeper<T>(
    policy: &RetryPolicy,
    mut op: impl FnMut() -> Result<T, CfgError>,
    mut sleep: impl FnMut(Duration),
) -> Result<T, CfgError> {
    let attempts = policy.max_attempts();
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        target: RETRY_TARGET,
                        attempts = attempt + 1,
                        "operation succeeded after backpressure"
                    );
                }
                return Ok(value);
            }
            Err(error) if !error.is_retryable() => return Err(error),
            Err(error) if attempt + 1 >= attempts => {
                warn!(
                    target: RETRY_TARGET,
                    attempts,
                    error = %error,
                    "retry attempts exhausted"
                );
                return Err(error);
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    target: RETRY_TARGET,
                    attempt = attempt + 1,
                    attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "backpressure; retrying"
                );
                sleep(delay);
                attempt += 1;
            }
        }
    }
}
