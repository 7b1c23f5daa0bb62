//! Bounded retry policies for remote calls.

use std::future::Future;
use std::time::Duration;

use log::warn;

use super::ApiError;
use crate::constants::{
    DEFAULT_AUTH_MAX_ATTEMPTS, DEFAULT_AUTH_RETRY_DELAY, DEFAULT_LIST_BACKOFF_STEP, DEFAULT_LIST_MAX_ATTEMPTS,
};

/// Delay between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failed attempt
    Fixed(Duration),
    /// `attempt × step` after the n-th failed attempt
    Linear(Duration),
}

/// Which failures are worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOn {
    AnyError,
    /// Only failures where no HTTP response was received
    NetworkOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    /// Exactly one attempt.
    pub const fn single() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::Fixed(Duration::ZERO),
            retry_on: RetryOn::AnyError,
        }
    }

    /// Policy for register/login: fixed delay, any error.
    pub const fn auth(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
            retry_on: RetryOn::AnyError,
        }
    }

    /// Policy for listing: linear backoff, network errors only.
    pub const fn list(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(step),
            retry_on: RetryOn::NetworkOnly,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step.saturating_mul(attempt),
        }
    }

    pub fn should_retry(&self, err: &ApiError) -> bool {
        match self.retry_on {
            RetryOn::AnyError => true,
            RetryOn::NetworkOnly => err.is_network(),
        }
    }

    /// Run `op` until it succeeds, the error is not retryable, or attempts
    /// run out. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= max_attempts || !self.should_retry(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_after(attempt);
                    warn!("🔁 {label} attempt {attempt}/{max_attempts} failed: {err}; retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::single()
    }
}

/// Retry policies used by the client, one per operation family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicies {
    pub auth: RetryPolicy,
    pub list: RetryPolicy,
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            auth: RetryPolicy::auth(DEFAULT_AUTH_MAX_ATTEMPTS, DEFAULT_AUTH_RETRY_DELAY),
            list: RetryPolicy::list(DEFAULT_LIST_MAX_ATTEMPTS, DEFAULT_LIST_BACKOFF_STEP),
        }
    }
}
