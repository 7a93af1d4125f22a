// SPDX-FileCopyrightText: 2026 Chorus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded exponential backoff for remote operations.

use std::future::Future;
use std::time::Duration;

use chorus_config::RetryConfig;
use chorus_core::ChorusError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Runs a fallible operation up to `max_attempts` times with exponential delays.
///
/// No delay follows the final attempt and delays carry no jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.multiplier,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The delay that follows `delay`, capped at the maximum.
    fn next_delay(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.multiplier).min(self.max_delay)
    }

    /// Delays slept between attempts when every attempt fails.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delays = Vec::with_capacity(self.max_attempts as usize);
        let mut delay = self.initial_delay.min(self.max_delay);
        for _ in 1..self.max_attempts {
            delays.push(delay);
            delay = self.next_delay(delay);
        }
        delays
    }

    /// Execute `operation`, retrying transient failures until it succeeds or
    /// attempts run out.
    ///
    /// Returns `Cancelled` as soon as `cancel` fires during a delay, and
    /// `RetriesExhausted` wrapping the last failure once every attempt failed.
    /// Failures that are not transient (including `Cancelled`) are returned
    /// as-is without another attempt.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, ChorusError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChorusError>>,
    {
        let mut delay = self.initial_delay.min(self.max_delay);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            if attempt >= self.max_attempts {
                return Err(ChorusError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            warn!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "operation failed, retrying"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(ChorusError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            delay = self.next_delay(delay);
        }
    }
}
