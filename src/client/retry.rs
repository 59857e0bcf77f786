//! Bounded retry with exponential backoff.
//!
//! A logical call is attempted at most `max_retries + 1` times, strictly one
//! attempt at a time. Retryable status codes and transient transport
//! failures both consume an attempt; anything else returns immediately.

use reqwest::header::RETRY_AFTER;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// A completed HTTP attempt, as seen by the retry loop.
pub trait Attempt {
    /// HTTP status code.
    fn status_code(&self) -> u16;

    /// Raw `Retry-After` header value, if present.
    fn retry_after(&self) -> Option<&str>;
}

impl Attempt for reqwest::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    fn retry_after(&self) -> Option<&str> {
        self.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok())
    }
}

impl Attempt for reqwest::blocking::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    fn retry_after(&self) -> Option<&str> {
        self.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok())
    }
}

/// Classifies a failed attempt as worth retrying.
pub trait TransientError {
    /// Timeouts, unreachable hosts and dropped connections.
    fn is_transient(&self) -> bool;
}

impl TransientError for reqwest::Error {
    fn is_transient(&self) -> bool {
        self.is_timeout() || self.is_connect() || self.is_request()
    }
}

/// Retry and backoff policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Delay before retry `i` is `backoff_base * 2^i`.
    pub backoff_base: Duration,

    /// Response statuses that trigger a retry.
    pub retryable_status_codes: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff_base: Duration::from_millis(500),
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Default policy with the given retry budget.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Set the backoff base.
    pub fn with_backoff(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Replace the retryable status set.
    pub fn with_retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Delay before retry `attempt` (0-based).
    ///
    /// A valid non-negative `Retry-After` (in seconds) raises the delay to the
    /// hint; it never shortens the computed backoff.
    pub fn delay(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let backoff = self.backoff_base.saturating_mul(factor);

        match retry_after.and_then(parse_retry_after) {
            Some(hint) => backoff.max(hint),
            None => backoff,
        }
    }

    /// Whether a response with `status` at `attempt` should be retried.
    pub fn should_retry_status(&self, status: u16, attempt: u32) -> bool {
        attempt < self.max_retries && self.retryable_status_codes.contains(&status)
    }

    fn should_retry_error<E: TransientError>(&self, err: &E, attempt: u32) -> bool {
        attempt < self.max_retries && err.is_transient()
    }

    /// Run `op` under this policy, suspending between attempts.
    ///
    /// Returns the first non-retried response, the last response once
    /// retries are exhausted, or the last transport error unchanged.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        T: Attempt,
        E: TransientError + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            let delay = match op().await {
                Ok(response) if self.should_retry_status(response.status_code(), attempt) => {
                    let delay = self.delay(attempt, response.retry_after());
                    debug!(
                        attempt,
                        status = response.status_code(),
                        delay_ms = delay.as_millis() as u64,
                        "retrying after retryable status"
                    );
                    delay
                }
                Err(err) if self.should_retry_error(&err, attempt) => {
                    let delay = self.delay(attempt, None);
                    debug!(
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transport error"
                    );
                    delay
                }
                outcome => return outcome,
            };

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    /// Blocking counterpart of [`RetryPolicy::run`]; sleeps the calling thread.
    pub fn run_blocking<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        T: Attempt,
        E: TransientError + std::fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 0;
        loop {
            let delay = match op() {
                Ok(response) if self.should_retry_status(response.status_code(), attempt) => {
                    let delay = self.delay(attempt, response.retry_after());
                    debug!(
                        attempt,
                        status = response.status_code(),
                        delay_ms = delay.as_millis() as u64,
                        "retrying after retryable status"
                    );
                    delay
                }
                Err(err) if self.should_retry_error(&err, attempt) => {
                    let delay = self.delay(attempt, None);
                    debug!(
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transport error"
                    );
                    delay
                }
                outcome => return outcome,
            };

            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            attempt += 1;
        }
    }
}

/// Parse a `Retry-After` value expressed in seconds.
///
/// HTTP-date forms and negative or non-finite numbers yield `None`.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    let seconds: f64 = raw.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}
