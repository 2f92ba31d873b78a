//! Job status polling

use crate::cancel::{CancellationController, cancellable};
use crate::config::{Config, PollingConfig, RetryConfig};
use crate::error::Result;
use crate::retry::with_retry;
use crate::status::normalize_envelope;
use crate::transport::{JobTransport, RawResponse};
use crate::types::{JobId, JobStatus};
use std::sync::Arc;

/// Polls one job until it reaches a terminal status or the run is cancelled
///
/// The poll interval is fixed. Transient request failures are retried per
/// [`RetryConfig`] without affecting the interval.
#[derive(Clone)]
pub struct JobPoller {
    transport: Arc<dyn JobTransport>,
    polling: PollingConfig,
    retry: RetryConfig,
}

impl JobPoller {
    /// Create a poller using the polling and retry settings of `config`
    pub fn new(transport: Arc<dyn JobTransport>, config: &Config) -> Self {
        Self {
            transport,
            polling: config.polling.clone(),
            retry: config.retry.clone(),
        }
    }

    /// Poll `job_id` to completion
    ///
    /// `on_update` sees every tick, terminal or not, in order. Cancellation is
    /// checked before each request and interrupts both the request and the
    /// wait between ticks.
    pub async fn poll<F>(
        &self,
        job_id: &JobId,
        cancel: &CancellationController,
        mut on_update: F,
    ) -> Result<JobStatus>
    where
        F: FnMut(&JobStatus) + Send,
    {
        let mut tick: u64 = 0;

        loop {
            cancel.check()?;

            let raw = with_retry(&self.retry, cancel, || {
                cancellable(cancel, self.transport.job_status(job_id))
            })
            .await?;
            let status = Self::interpret(job_id, &raw)?;
            tick += 1;

            tracing::debug!(
                job_id = %job_id,
                tick,
                complete = status.complete,
                in_queue = status.in_queue,
                progress = ?status.progress_percent,
                "job status"
            );

            on_update(&status);

            if status.is_terminal() {
                tracing::debug!(job_id = %job_id, ticks = tick, "job reached terminal status");
                return Ok(status);
            }

            cancel.sleep(self.polling.interval).await?;
        }
    }

    /// Normalize one status response
    ///
    /// A body that is not JSON is a parse error. Payloads without a job id
    /// inherit the id being polled.
    fn interpret(job_id: &JobId, raw: &RawResponse) -> Result<JobStatus> {
        let value = raw.parse_json("job status")?;
        let mut status = normalize_envelope(&value);
        if status.job_id.is_unknown() {
            status.job_id = job_id.clone();
        }
        Ok(status)
    }
}
