//! Job status protocol: wire payload normalization and state derivation.
//!
//! Every status payload the backend sends is funnelled through
//! [`normalize_status`] (or [`normalize_envelope`] for the queue-wrapped form).
//! Normalization never fails: missing or malformed fields fall back to safe
//! defaults, and key lookup ignores case, `_` and `-` so `jobId`, `job_id` and
//! `JobID` all resolve to the same field.
//!
//! [`derive_update`] is the pure projection used for UI/telemetry, and
//! [`RunState`] is the per-run state machine driven by the job runner.

use crate::error::{Error, Result};
use crate::types::{JobId, JobState, JobStatus, JobUpdate, QueueInfo, UNKNOWN_JOB_ID};
use serde_json::{Map, Value};

const JOB_ID_KEYS: &[&str] = &["jobId", "id"];
const PROGRESS_KEYS: &[&str] = &["progressPercent", "progress", "percent"];
const MESSAGE_KEYS: &[&str] = &["progressMessage", "message", "stage"];

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find a field by any of the given names, ignoring case and separators
fn lookup<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    for name in names {
        let wanted = normalize_key(name);
        if let Some((_, value)) = map.iter().find(|(k, _)| normalize_key(k) == wanted)
            && !value.is_null()
        {
            return Some(value);
        }
    }
    None
}

fn as_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn as_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn as_f64(value: Option<&Value>) -> Option<f64> {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn as_u32(value: Option<&Value>) -> Option<u32> {
    let n = as_f64(value)?;
    (n >= 0.0).then(|| n.min(u32::MAX as f64) as u32)
}

fn as_notes(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Turn a raw status payload into a [`JobStatus`]
///
/// `queue_info`, when given, overrides any queue fields inside `raw`.
/// Non-object payloads produce the default status for the unknown job.
pub fn normalize_status(raw: &Value, queue_info: Option<QueueInfo>) -> JobStatus {
    let empty = Map::new();
    let map = raw.as_object().unwrap_or(&empty);

    let job_id = as_text(lookup(map, JOB_ID_KEYS)).unwrap_or_else(|| UNKNOWN_JOB_ID.to_string());
    let complete = as_bool(lookup(map, &["complete", "completed", "done"]));
    let error = as_text(lookup(map, &["error", "errorMessage"]));

    let (in_queue, queue_position) = match queue_info {
        Some(info) => (info.in_queue, info.position),
        None => (
            as_bool(lookup(map, &["inQueue", "queued"])),
            as_u32(lookup(map, &["queuePosition", "position"])),
        ),
    };

    JobStatus {
        job_id: JobId(job_id),
        complete,
        error,
        progress_percent: as_f64(lookup(map, PROGRESS_KEYS)),
        progress_message: as_text(lookup(map, MESSAGE_KEYS)),
        in_queue,
        queue_position: if in_queue && !complete {
            queue_position
        } else {
            None
        },
        notes: as_notes(lookup(map, &["notes", "note"])),
    }
}

/// Normalize a status body that may be wrapped as `{jobResult, queueInfo}`
pub fn normalize_envelope(raw: &Value) -> JobStatus {
    let Some(map) = raw.as_object() else {
        return normalize_status(raw, None);
    };

    match lookup(map, &["jobResult"]) {
        Some(inner) => {
            let queue_info = lookup(map, &["queueInfo"])
                .and_then(Value::as_object)
                .map(|info| QueueInfo {
                    in_queue: as_bool(lookup(info, &["inQueue"])),
                    position: as_u32(lookup(info, &["position", "queuePosition"])),
                });
            normalize_status(inner, queue_info)
        }
        None => normalize_status(raw, None),
    }
}

/// Derive the client-facing state of a status
pub fn derive_state(status: &JobStatus) -> JobState {
    if status.error.is_some() {
        JobState::Failed
    } else if status.in_queue && !status.complete {
        JobState::Queued
    } else if status.complete {
        JobState::Completed
    } else {
        JobState::Processing
    }
}

fn clamp_percent(value: f64) -> u8 {
    value.clamp(0.0, 100.0).round() as u8
}

/// Project a status onto a [`JobUpdate`]
///
/// Pure and total. When the server omits progress, completed jobs report 100,
/// queued jobs 0 and everything else `fallback_progress`.
pub fn derive_update(status: &JobStatus, fallback_progress: u8) -> JobUpdate {
    let state = derive_state(status);
    let progress_percent = match status.progress_percent {
        Some(p) => clamp_percent(p),
        None => match state {
            JobState::Completed => 100,
            JobState::Queued => 0,
            JobState::Processing | JobState::Failed => fallback_progress.min(100),
        },
    };

    JobUpdate {
        job_id: status.job_id.clone(),
        status: state,
        progress_percent,
        message: status
            .progress_message
            .clone()
            .or_else(|| status.notes.last().cloned()),
        queue_position: if state == JobState::Queued {
            status.queue_position
        } else {
            None
        },
        error: status.error.clone(),
    }
}

/// Interpret the immediate JSON reply to an async submission
///
/// Returns the job id for `{async: true, jobId}`. An `error` field, a missing
/// job id or a non-object body is an [`Error::AsyncProtocol`].
pub fn classify_submission(body: &Value) -> Result<JobId> {
    let Some(map) = body.as_object() else {
        return Err(Error::AsyncProtocol(format!(
            "expected a JSON object, got: {body}"
        )));
    };

    if let Some(error) = lookup(map, &["error"]) {
        let message = as_text(Some(error)).unwrap_or_else(|| error.to_string());
        return Err(Error::AsyncProtocol(format!(
            "server returned an error instead of a job: {message}"
        )));
    }

    match as_text(lookup(map, &["jobId"])) {
        Some(id) => Ok(JobId(id)),
        None => Err(Error::AsyncProtocol(
            "No job ID received from server".to_string(),
        )),
    }
}

/// Per-run lifecycle: `Submitted → {SynchronousDone | Queued ⇄ Processing → {Completed | Failed}}`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Request sent, reply not yet classified
    Submitted,
    /// The server answered with the result directly
    SynchronousDone,
    /// Job waiting in the server queue
    Queued,
    /// Job running on the server
    Processing,
    /// Job finished successfully
    Completed,
    /// Job finished with an error
    Failed,
}

impl RunState {
    /// True once the run can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::SynchronousDone | RunState::Completed | RunState::Failed
        )
    }

    /// Apply an observed job state
    ///
    /// Terminal states absorb every further observation. `Queued` and
    /// `Processing` may alternate when the server reschedules a job.
    pub fn observe(self, observed: JobState) -> RunState {
        if self.is_terminal() {
            return self;
        }
        match observed {
            JobState::Queued => RunState::Queued,
            JobState::Processing => RunState::Processing,
            JobState::Completed => RunState::Completed,
            JobState::Failed => RunState::Failed,
        }
    }

    /// The server declined async handling and returned the result inline
    pub fn synchronous(self) -> RunState {
        match self {
            RunState::Submitted => RunState::SynchronousDone,
            other => other,
        }
    }
}
