//! Core types for docjob

use serde::{Deserialize, Serialize};

/// Sentinel job id used when a status payload carries none
pub const UNKNOWN_JOB_ID: &str = "unknown";

/// Content type used when neither the manifest nor the transport names one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Opaque server-side job identifier, stable for the job's lifetime
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new JobId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this is the placeholder produced for payloads without an id
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_JOB_ID
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-side identifier of an input file (reported back in `success_source_ids`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Queue side-channel surfaced by the status envelope
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueInfo {
    /// Whether the job is waiting in the server queue
    pub in_queue: bool,
    /// Zero-based position in the queue
    pub position: Option<u32>,
}

/// Snapshot of a server-side job, produced fresh on every poll tick
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Job identifier
    pub job_id: JobId,
    /// Server reported completion
    pub complete: bool,
    /// Terminal failure message; presence implies the job is over
    pub error: Option<String>,
    /// Progress in percent as reported by the server
    pub progress_percent: Option<f64>,
    /// Human-readable progress text
    pub progress_message: Option<String>,
    /// Whether the job is waiting in the server queue
    pub in_queue: bool,
    /// Queue position, only meaningful while queued and not complete
    pub queue_position: Option<u32>,
    /// Free-text annotations attached by the server
    pub notes: Vec<String>,
}

impl JobStatus {
    /// A job with an error is treated as complete for control flow
    pub fn is_terminal(&self) -> bool {
        self.complete || self.error.is_some()
    }

    /// True if the job ended in failure
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Client-facing job state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Waiting in the server queue
    Queued,
    /// Running on the server
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl JobState {
    /// Completed and Failed are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Projection of a [`JobStatus`] for UI and telemetry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    /// Job identifier
    pub job_id: JobId,
    /// Derived state
    pub status: JobState,
    /// Progress clamped to 0..=100
    pub progress_percent: u8,
    /// Optional progress text
    pub message: Option<String>,
    /// Queue position while queued
    pub queue_position: Option<u32>,
    /// Error text for failed jobs
    pub error: Option<String>,
}

/// Manifest entry for one file of a multi-file result
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobResultFileMeta {
    /// Identifier used to download the file
    pub file_id: String,
    /// Server-side file name
    pub file_name: String,
    /// MIME type
    pub content_type: String,
    /// Size in bytes
    pub file_size: u64,
}

/// Batch-level progress counter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingProgress {
    /// 1-based index of the file being processed
    pub current: usize,
    /// Number of files in the batch
    pub total: usize,
    /// Name of the file being processed
    pub current_file_name: Option<String>,
}

/// A file handed to the pipeline by the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputFile {
    /// Caller-side identifier
    pub id: SourceId,
    /// File name including extension
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl InputFile {
    /// Create an input file
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            id: SourceId(id.into()),
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Terminal artifact of a run; owned by the caller once returned
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFile {
    /// Resolved file name
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl OutputFile {
    /// Create an output file
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Result of a batch run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Every output file, in processing order
    pub output_files: Vec<OutputFile>,
    /// Inputs that produced output
    pub success_source_ids: Vec<SourceId>,
    /// Names of inputs that failed (including skipped empty inputs)
    pub failed_files: Vec<String>,
}

/// Events emitted during a run
///
/// Events for one run are strictly ordered; a `JobUpdate` with a terminal state
/// is always the last update emitted for its job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch run started
    BatchStarted {
        /// Number of files that will be processed
        total: usize,
    },

    /// Per-file progress in a sequential batch
    Progress(ProcessingProgress),

    /// Free-text status line
    Status {
        /// Status text
        message: String,
    },

    /// Job lifecycle update
    JobUpdate(JobUpdate),

    /// A single input failed; the batch continues
    FileFailed {
        /// Input file name
        name: String,
        /// Display message
        error: String,
    },

    /// A batch run finished with at least one success
    BatchFinished {
        /// Number of inputs that produced output
        succeeded: usize,
        /// Number of inputs that failed
        failed: usize,
    },

    /// The run was cancelled
    Cancelled,
}
