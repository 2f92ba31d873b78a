//! Single-request orchestration: submit, poll, fetch, materialize

use super::download::MultiFileDownloader;
use super::operation::Operation;
use super::poller::JobPoller;
use super::response::{OutputNaming, ResponseHandler, ResponseProcessor};
use super::result::{ResultFetcher, ResultPayload, envelope_message};
use crate::cancel::{CancellationController, cancellable};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::form::FormPayload;
use crate::status::{RunState, classify_submission, derive_update};
use crate::transport::JobTransport;
use crate::types::{Event, InputFile, JobId, JobState, JobUpdate, OutputFile};
use crate::utils::{rejected_file_ids, with_async_flag};
use std::sync::Arc;
use tokio::sync::broadcast;

/// One logical request: an endpoint, its form and the inputs it covers
pub struct JobRequest<'a> {
    /// Backend-relative endpoint; the async flag is added when missing
    pub endpoint: &'a str,
    /// Encoded submission
    pub form: FormPayload,
    /// Inputs covered by this request, used for output naming
    pub inputs: &'a [InputFile],
    /// Output naming rules
    pub naming: &'a OutputNaming,
    /// Custom result handler
    pub handler: Option<&'a dyn ResponseHandler>,
}

impl<'a> JobRequest<'a> {
    /// Request running `operation` over `inputs`
    pub fn for_operation(operation: &'a Operation, inputs: &'a [InputFile]) -> Self {
        Self {
            endpoint: &operation.endpoint,
            form: operation.build_form(inputs),
            inputs,
            naming: &operation.naming,
            handler: operation.handler(),
        }
    }
}

/// Drives one [`JobRequest`] to a list of output files
///
/// Emits [`Event::JobUpdate`]s in observation order. For async jobs the first
/// update is `queued` and the last is `completed` (emitted only after every
/// output exists) or `failed`.
#[derive(Clone)]
pub struct JobRunner {
    transport: Arc<dyn JobTransport>,
    config: Arc<Config>,
    event_tx: broadcast::Sender<Event>,
}

impl JobRunner {
    /// Create a runner publishing to `event_tx`
    pub fn new(
        transport: Arc<dyn JobTransport>,
        config: Arc<Config>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            transport,
            config,
            event_tx,
        }
    }

    fn emit(&self, event: Event) {
        // No receivers is fine
        self.event_tx.send(event).ok();
    }

    fn emit_update(&self, update: JobUpdate) {
        self.emit(Event::JobUpdate(update));
    }

    fn failed_update(job_id: &JobId, message: String) -> JobUpdate {
        JobUpdate {
            job_id: job_id.clone(),
            status: JobState::Failed,
            progress_percent: 0,
            message: None,
            queue_position: None,
            error: Some(message),
        }
    }

    /// Run the request
    ///
    /// Cancellation takes precedence over every other outcome once the
    /// controller is triggered.
    pub async fn run(
        &self,
        request: JobRequest<'_>,
        cancel: &CancellationController,
    ) -> Result<Vec<OutputFile>> {
        cancel.check()?;

        let endpoint = with_async_flag(request.endpoint);
        tracing::info!(endpoint = %endpoint, inputs = request.inputs.len(), "submitting job");

        let submitted = cancellable(cancel, self.transport.submit(&endpoint, &request.form))
            .await
            .map_err(|e| match e {
                Error::Http { status: 422, body } => {
                    let file_ids = rejected_file_ids(&body);
                    if file_ids.is_empty() {
                        Error::Http { status: 422, body }
                    } else {
                        Error::RejectedFiles { file_ids }
                    }
                }
                other => other,
            });
        let response = match submitted {
            Ok(response) => response,
            Err(_) if cancel.is_cancelled() => return Err(Error::Cancelled),
            Err(e) => return Err(e),
        };

        if !response.is_json() {
            let state = RunState::Submitted.synchronous();
            tracing::debug!(endpoint = %endpoint, ?state, "server answered synchronously");
            let processed = ResponseProcessor::process(
                &response,
                request.inputs,
                request.naming,
                request.handler,
            )
            .await;
            return match processed {
                Err(_) if cancel.is_cancelled() => Err(Error::Cancelled),
                Err(e) => Err(e),
                Ok(outputs) => {
                    cancel.check()?;
                    Ok(outputs)
                }
            };
        }

        let job_id = classify_submission(&response.parse_json("submission response")?)?;
        tracing::info!(job_id = %job_id, endpoint = %endpoint, "job accepted for async processing");

        let mut state = RunState::Submitted.observe(JobState::Queued);
        self.emit_update(JobUpdate {
            job_id: job_id.clone(),
            status: JobState::Queued,
            progress_percent: 0,
            message: None,
            queue_position: None,
            error: None,
        });

        let outcome = self.drive(&job_id, &request, cancel, &mut state).await;

        match outcome {
            Ok(outputs) => Ok(outputs),
            Err(_) if cancel.is_cancelled() => {
                if !state.is_terminal() {
                    self.cancel_remote(&job_id).await;
                }
                Err(Error::Cancelled)
            }
            Err(e) => {
                if state != RunState::Failed {
                    self.emit_update(Self::failed_update(&job_id, e.user_message()));
                }
                tracing::warn!(job_id = %job_id, error = %e, "job run failed");
                Err(e)
            }
        }
    }

    /// The async path after the job was accepted
    async fn drive(
        &self,
        job_id: &JobId,
        request: &JobRequest<'_>,
        cancel: &CancellationController,
        state: &mut RunState,
    ) -> Result<Vec<OutputFile>> {
        let fallback = self.config.polling.fallback_progress;
        let poller = JobPoller::new(self.transport.clone(), &self.config);

        let status = poller
            .poll(job_id, cancel, |status| {
                let update = derive_update(status, fallback);
                *state = state.observe(update.status);
                // Completion is announced once the outputs exist
                if update.status != JobState::Completed {
                    self.emit_update(update);
                }
            })
            .await?;

        if let Some(message) = status.error.clone() {
            tracing::warn!(job_id = %job_id, error = %message, "job failed on the server");
            return Err(Error::JobFailed {
                job_id: job_id.clone(),
                message,
            });
        }

        let payload = ResultFetcher::new(self.transport.clone(), &self.config)
            .fetch(job_id, cancel)
            .await?;

        let outputs = match payload {
            ResultPayload::Blob(response) => {
                ResponseProcessor::process(&response, request.inputs, request.naming, request.handler)
                    .await?
            }
            ResultPayload::MultipleFiles(files) => {
                MultiFileDownloader::new(self.transport.clone(), &self.config)
                    .download_all(&files, cancel)
                    .await?
            }
            ResultPayload::Json(value) => {
                return Err(Error::JobFailed {
                    job_id: job_id.clone(),
                    message: envelope_message(&value),
                });
            }
        };

        cancel.check()?;

        let mut done = derive_update(&status, fallback);
        done.progress_percent = 100;
        self.emit_update(done);
        tracing::info!(job_id = %job_id, outputs = outputs.len(), "job completed");

        Ok(outputs)
    }

    /// Best-effort server-side cancellation; never changes the run's outcome
    async fn cancel_remote(&self, job_id: &JobId) {
        let polling = &self.config.polling;
        if !polling.cancel_remote_jobs {
            return;
        }

        match tokio::time::timeout(polling.remote_cancel_timeout, self.transport.cancel_job(job_id))
            .await
        {
            Ok(Ok(())) => tracing::info!(job_id = %job_id, "cancelled job on the server"),
            Ok(Err(e)) => {
                tracing::warn!(job_id = %job_id, error = %e, "failed to cancel job on the server")
            }
            Err(_) => tracing::warn!(
                job_id = %job_id,
                timeout_secs = polling.remote_cancel_timeout.as_secs(),
                "timed out cancelling job on the server"
            ),
        }
    }
}
