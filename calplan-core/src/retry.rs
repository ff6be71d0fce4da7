//! Retry with capped exponential backoff and jitter, plus post-call pacing.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RemoteError;

/// Retries allowed after the initial call.
pub const MAX_ATTEMPTS: u32 = 6;

/// Upper bound for the exponential part of the backoff, in seconds.
pub const MAX_BACKOFF_SECS: u64 = 64;

const BACKOFF_JITTER_SECS: f64 = 0.8;

/// Retry bookkeeping for a single remote call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
}

impl RetryState {
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether the failure deserves another attempt.
    pub fn should_retry(&self, error: &RemoteError) -> bool {
        error.is_retryable() && self.attempt < MAX_ATTEMPTS
    }

    /// Move to the next attempt and return its backoff (without jitter).
    pub fn advance(&mut self) -> Duration {
        self.attempt += 1;
        backoff_delay(self.attempt)
    }
}

/// `min(64, 2^attempt)` seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2_u64
        .checked_pow(attempt)
        .map_or(MAX_BACKOFF_SECS, |s| s.min(MAX_BACKOFF_SECS));
    Duration::from_secs(secs)
}

/// Fixed delay applied after every remote write, independent of backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// After each insert
    Import,
    /// After each delete attempt, successful or not
    Purge,
}

impl Pacing {
    fn base(self) -> Duration {
        match self {
            Pacing::Import => Duration::from_secs(1),
            Pacing::Purge => Duration::from_millis(200),
        }
    }

    fn max_jitter_secs(self) -> f64 {
        match self {
            Pacing::Import => 0.4,
            Pacing::Purge => 0.2,
        }
    }

    /// Upper bound of the delay (exclusive).
    pub fn max_delay(self) -> Duration {
        self.base() + Duration::from_secs_f64(self.max_jitter_secs())
    }
}

fn jitter(max_secs: f64) -> Duration {
    Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..max_secs))
}

/// Shared retry decision logic for import and purge.
///
/// The cap and attempt count are fixed. A cancellation token, when set, is
/// checked before every call and interrupts any pending sleep.
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    cancel: Option<CancellationToken>,
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Run `operation`, retrying rate-limit/forbidden failures with backoff.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut state = RetryState::default();

        loop {
            if self.is_cancelled() {
                return Err(RemoteError::cancelled());
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if state.should_retry(&error) => {
                    let delay = state.advance() + jitter(BACKOFF_JITTER_SECS);
                    warn!(
                        operation = label,
                        status = error.status(),
                        attempt = state.attempt(),
                        max_attempts = MAX_ATTEMPTS,
                        "⏳ Rate limited, retrying in {:.1}s",
                        delay.as_secs_f64()
                    );
                    self.sleep(delay).await?;
                }
                Err(error) => {
                    debug!(
                        operation = label,
                        attempt = state.attempt(),
                        error = %error,
                        "giving up"
                    );
                    return Err(error);
                }
            }
        }
    }

    /// Sleep for the pacing delay of `pacing`.
    pub async fn pace(&self, pacing: Pacing) -> Result<(), RemoteError> {
        self.sleep(pacing.base() + jitter(pacing.max_jitter_secs())).await
    }

    async fn sleep(&self, delay: Duration) -> Result<(), RemoteError> {
        match &self.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(RemoteError::cancelled()),
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            None => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}
