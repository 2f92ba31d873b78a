//! Retry logic with exponential backoff
//!
//! Used for the idempotent requests of a run (status polls, result fetches,
//! file downloads). Submissions are never retried: a resent multipart POST
//! could start a second job on the server.
//!
//! # Example
//!
//! ```no_run
//! use docjob::retry::{IsRetryable, with_retry};
//! use docjob::config::RetryConfig;
//! use docjob::CancellationController;
//!
//! # async fn example() -> docjob::Result<()> {
//! let config = RetryConfig::default();
//! let cancel = CancellationController::new();
//! let body = with_retry(&config, &cancel, || async {
//!     Ok::<_, docjob::Error>(b"status".to_vec())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::cancel::CancellationController;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// HTTP statuses that indicate the server may accept the same request shortly
const RETRYABLE_STATUSES: &[u16] = &[429, 502, 503, 504];

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, overloaded gateways)
/// should return `true`. Everything the server decided on purpose should not.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e
                        .status()
                        .is_some_and(|s| RETRYABLE_STATUSES.contains(&s.as_u16()))
            }
            Error::Http { status, .. } => RETRYABLE_STATUSES.contains(status),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            Error::Cancelled
            | Error::Config { .. }
            | Error::AsyncProtocol(_)
            | Error::JobFailed { .. }
            | Error::ResultParse { .. }
            | Error::EmptyOutput(_)
            | Error::AllFilesFailed { .. }
            | Error::RejectedFiles { .. }
            | Error::InvalidInput(_)
            | Error::Archive(_)
            | Error::ErrorPage(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Backoff sleeps are raced against `cancel`; a cancellation during a wait
/// returns [`Error::Cancelled`] immediately and no further attempt is made.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationController,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        cancel.check()?;

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "request succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "request failed, retrying"
                );

                let wait = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };
                cancel.sleep(wait).await?;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "request failed after all retry attempts exhausted"
                    );
                } else if !e.is_cancelled() {
                    tracing::debug!(error = %e, "request failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Add random jitter to a delay
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
