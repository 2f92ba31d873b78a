//! Transport seam between the job pipeline and the backend
//!
//! The pipeline talks to the backend only through [`JobTransport`], which
//! keeps every component testable against an in-memory transport. The
//! production implementation is [`HttpTransport`].

mod http;

pub use http::HttpTransport;

use crate::error::{Error, Result};
use crate::form::FormPayload;
use crate::types::JobId;
use crate::utils::{filename_from_content_disposition, is_json_content_type};

/// A successful (2xx) backend response, reduced to what the pipeline interprets
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Declared `Content-Type`, if any
    pub content_type: Option<String>,
    /// `Content-Disposition` header, if any
    pub content_disposition: Option<String>,
    /// Response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// 200 response with the given content type and body
    pub fn new(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.into()),
            content_disposition: None,
            body: body.into(),
        }
    }

    /// 200 response carrying a JSON document
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new("application/json", value.to_string())
    }

    /// Attach a `Content-Disposition` header
    pub fn with_disposition(mut self, value: impl Into<String>) -> Self {
        self.content_disposition = Some(value.into());
        self
    }

    /// Whether the declared content type is JSON
    pub fn is_json(&self) -> bool {
        self.content_type.as_deref().is_some_and(is_json_content_type)
    }

    /// Filename asserted by the server through `Content-Disposition`
    pub fn filename(&self) -> Option<String> {
        self.content_disposition
            .as_deref()
            .and_then(filename_from_content_disposition)
    }

    /// Body decoded as (lossy) UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON; `context` names the payload in the error
    pub fn parse_json(&self, context: &str) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.body).map_err(|e| Error::parse(context, e))
    }
}

/// Backend operations used by the job pipeline
///
/// Implementations return `Err(Error::Http { .. })` for non-2xx responses and
/// `Err(Error::Network(..))` for transport failures. Dropping a returned future
/// must abort the request; the pipeline relies on this for cancellation.
#[async_trait::async_trait]
pub trait JobTransport: Send + Sync {
    /// POST a multipart form to an operation endpoint
    ///
    /// `endpoint` is a path relative to the backend base URL and already
    /// carries the async query flag.
    async fn submit(&self, endpoint: &str, form: &FormPayload) -> Result<RawResponse>;

    /// GET the status of a job
    async fn job_status(&self, job_id: &JobId) -> Result<RawResponse>;

    /// GET the result of a completed job
    async fn job_result(&self, job_id: &JobId) -> Result<RawResponse>;

    /// GET one file of a multi-file result
    async fn download_file(&self, file_id: &str) -> Result<RawResponse>;

    /// DELETE a job that is still queued or running
    async fn cancel_job(&self, job_id: &JobId) -> Result<()>;
}
