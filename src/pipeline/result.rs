//! Result retrieval and classification

use crate::cancel::{CancellationController, cancellable};
use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::transport::{JobTransport, RawResponse};
use crate::types::{JobId, JobResultFileMeta};
use serde_json::Value;
use std::sync::Arc;

/// Prefix the backend uses for plain-text result errors of failed jobs
const JOB_FAILED_PREFIX: &str = "Job failed";

/// Classified result of a completed job
#[derive(Clone, Debug, PartialEq)]
pub enum ResultPayload {
    /// Opaque body (any non-JSON content type)
    Blob(RawResponse),
    /// Manifest of files to download individually
    MultipleFiles(Vec<JobResultFileMeta>),
    /// Any other JSON document, treated as an error envelope
    Json(Value),
}

impl ResultPayload {
    /// Classify a result response by its declared content type
    ///
    /// Only bodies declared as JSON are parsed; a declared-JSON body that does
    /// not parse is an error, never a blob.
    pub fn classify(response: RawResponse) -> Result<Self> {
        if !response.is_json() {
            return Ok(ResultPayload::Blob(response));
        }

        let value = response.parse_json("job result")?;
        let is_manifest = value
            .get("hasMultipleFiles")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if is_manifest && let Some(files) = value.get("files").filter(|f| f.is_array()) {
            let files: Vec<JobResultFileMeta> = serde_json::from_value(files.clone())
                .map_err(|e| Error::parse("result manifest", e))?;
            return Ok(ResultPayload::MultipleFiles(files));
        }

        Ok(ResultPayload::Json(value))
    }
}

/// Human-readable message from a JSON error envelope
///
/// Looks at `error`, then `message`, then `detail`; otherwise the compact JSON.
pub fn envelope_message(value: &Value) -> String {
    ["error", "message", "detail"]
        .iter()
        .find_map(|key| match value.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_else(|| format!("Unexpected job result: {value}"))
}

/// Retrieves the result of a completed job
#[derive(Clone)]
pub struct ResultFetcher {
    transport: Arc<dyn JobTransport>,
    retry: RetryConfig,
}

impl ResultFetcher {
    /// Create a fetcher using the retry settings of `config`
    pub fn new(transport: Arc<dyn JobTransport>, config: &Config) -> Self {
        Self {
            transport,
            retry: config.retry.clone(),
        }
    }

    /// Fetch and classify the result of `job_id`
    ///
    /// A 4xx reply whose text starts with "Job failed" is reported as
    /// [`Error::JobFailed`] with the text after the prefix.
    pub async fn fetch(
        &self,
        job_id: &JobId,
        cancel: &CancellationController,
    ) -> Result<ResultPayload> {
        let response = with_retry(&self.retry, cancel, || {
            cancellable(cancel, self.transport.job_result(job_id))
        })
        .await
        .map_err(|e| match e {
            Error::Http { status, body }
                if (400..500).contains(&status)
                    && body.trim_start().starts_with(JOB_FAILED_PREFIX) =>
            {
                let message = body
                    .trim_start()
                    .trim_start_matches(JOB_FAILED_PREFIX)
                    .trim_start_matches(':')
                    .trim();
                Error::JobFailed {
                    job_id: job_id.clone(),
                    message: if message.is_empty() {
                        body.trim().to_string()
                    } else {
                        message.to_string()
                    },
                }
            }
            other => other,
        })?;

        let payload = ResultPayload::classify(response)?;
        match &payload {
            ResultPayload::Blob(raw) => tracing::debug!(
                job_id = %job_id,
                bytes = raw.body.len(),
                content_type = ?raw.content_type,
                "fetched job result"
            ),
            ResultPayload::MultipleFiles(files) => tracing::debug!(
                job_id = %job_id,
                files = files.len(),
                "job produced multiple files"
            ),
            ResultPayload::Json(_) => {
                tracing::debug!(job_id = %job_id, "job result is a JSON envelope")
            }
        }
        Ok(payload)
    }
}
