//! Shared test helpers: a scripted in-memory transport and response builders.

use crate::error::{Error, Result};
use crate::form::FormPayload;
use crate::transport::{JobTransport, RawResponse};
use crate::types::{InputFile, JobId};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// One recorded transport call
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Submit { endpoint: String, files: Vec<String> },
    Status(JobId),
    Result(JobId),
    Download(String),
    Cancel(JobId),
}

/// Transport that replays canned responses per call kind
///
/// Each queue is consumed front to back. An exhausted queue answers with an
/// HTTP 500, except the status queue which repeats `status_fallback` if set.
#[derive(Default)]
pub(crate) struct MockTransport {
    submits: Mutex<VecDeque<Result<RawResponse>>>,
    statuses: Mutex<VecDeque<Result<RawResponse>>>,
    status_fallback: Mutex<Option<RawResponse>>,
    results: Mutex<VecDeque<Result<RawResponse>>>,
    files: Mutex<HashMap<String, VecDeque<Result<RawResponse>>>>,
    cancel_result: Mutex<Option<Result<()>>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<Call>>,
}

fn exhausted(kind: &str) -> Error {
    Error::Http {
        status: 500,
        body: format!("no more mock {kind} responses"),
    }
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_submit(&self, response: Result<RawResponse>) -> &Self {
        self.submits.lock().unwrap().push_back(response);
        self
    }

    pub(crate) fn push_status(&self, response: Result<RawResponse>) -> &Self {
        self.statuses.lock().unwrap().push_back(response);
        self
    }

    /// Status returned once the scripted statuses run out
    pub(crate) fn repeat_status(&self, response: RawResponse) -> &Self {
        *self.status_fallback.lock().unwrap() = Some(response);
        self
    }

    pub(crate) fn push_result(&self, response: Result<RawResponse>) -> &Self {
        self.results.lock().unwrap().push_back(response);
        self
    }

    pub(crate) fn push_file(&self, file_id: &str, response: Result<RawResponse>) -> &Self {
        self.files
            .lock()
            .unwrap()
            .entry(file_id.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub(crate) fn set_cancel_result(&self, result: Result<()>) -> &Self {
        *self.cancel_result.lock().unwrap() = Some(result);
        self
    }

    /// Delay every call, to give cancellation something to interrupt
    pub(crate) fn set_delay(&self, delay: Duration) -> &Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Status(_)))
            .count()
    }

    pub(crate) fn cancel_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Cancel(_)))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl JobTransport for MockTransport {
    async fn submit(&self, endpoint: &str, form: &FormPayload) -> Result<RawResponse> {
        self.record(Call::Submit {
            endpoint: endpoint.to_string(),
            files: form.files.iter().map(|f| f.file_name.clone()).collect(),
        });
        self.pause().await;
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("submit")))
    }

    async fn job_status(&self, job_id: &JobId) -> Result<RawResponse> {
        self.record(Call::Status(job_id.clone()));
        self.pause().await;
        let next = self.statuses.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => self
                .status_fallback
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| exhausted("status")),
        }
    }

    async fn job_result(&self, job_id: &JobId) -> Result<RawResponse> {
        self.record(Call::Result(job_id.clone()));
        self.pause().await;
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted("result")))
    }

    async fn download_file(&self, file_id: &str) -> Result<RawResponse> {
        self.record(Call::Download(file_id.to_string()));
        self.pause().await;
        self.files
            .lock()
            .unwrap()
            .get_mut(file_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(exhausted("file")))
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        self.record(Call::Cancel(job_id.clone()));
        self.cancel_result.lock().unwrap().take().unwrap_or(Ok(()))
    }
}

/// `{async: true, jobId}` submission reply
pub(crate) fn async_accepted(job_id: &str) -> RawResponse {
    RawResponse::json(&json!({ "async": true, "jobId": job_id }))
}

/// Status payload
pub(crate) fn status_json(value: Value) -> RawResponse {
    RawResponse::json(&value)
}

/// Non-terminal processing status
pub(crate) fn processing(job_id: &str, progress: Option<f64>) -> RawResponse {
    let mut value = json!({ "jobId": job_id, "complete": false });
    if let Some(p) = progress {
        value["progress"] = json!(p);
    }
    RawResponse::json(&value)
}

/// Completed status
pub(crate) fn completed(job_id: &str) -> RawResponse {
    RawResponse::json(&json!({ "jobId": job_id, "complete": true }))
}

/// Failed status carrying `error`
pub(crate) fn failed(job_id: &str, error: &str) -> RawResponse {
    RawResponse::json(&json!({ "jobId": job_id, "complete": true, "error": error }))
}

/// Binary PDF body with an optional server filename
pub(crate) fn pdf(body: &[u8], filename: Option<&str>) -> RawResponse {
    let response = RawResponse::new("application/pdf", body.to_vec());
    match filename {
        Some(name) => response.with_disposition(format!("attachment; filename=\"{name}\"")),
        None => response,
    }
}

pub(crate) fn http_error(status: u16, body: &str) -> Error {
    Error::Http {
        status,
        body: body.to_string(),
    }
}

/// Input PDF with a non-empty body
pub(crate) fn input(id: &str, name: &str) -> InputFile {
    InputFile::new(id, name, "application/pdf", format!("%PDF-{name}").into_bytes())
}

/// Build a zip archive in memory
pub(crate) fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ::zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            std::io::Write::write_all(&mut writer, content).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}
