//! Bounded retry with exponential backoff for outbound HTTP calls.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy shared by the ticket client and the Ollama backends.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (0 disables retry).
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            max_interval: self.max_interval,
            multiplier: 2.0,
            randomization_factor: 0.2,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or
    /// the retry budget is spent. Returns the last error in the latter cases.
    pub async fn run<T, E, F, Fut>(&self, what: &str, is_transient: impl Fn(&E) -> bool, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut backoff = self.backoff();
        let mut attempts = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempts < self.max_retries && is_transient(&err) => {
                    let delay = backoff.next_backoff().unwrap_or(self.max_interval);
                    attempts += 1;
                    warn!(
                        "{} failed ({}), retrying in {:?} (attempt {}/{})",
                        what, err, delay, attempts, self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Status codes worth retrying: rate limiting and gateway trouble.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Transport errors worth retrying.
pub fn is_transient_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
