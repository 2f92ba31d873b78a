//! Error types for docjob
//!
//! This module provides error handling for the job pipeline, including:
//! - The failure taxonomy of a job run (transport, protocol, job, parse, output)
//! - Machine-readable error codes for callers that map errors to UI states
//! - Display strings that are safe to show to an end user as-is

use crate::types::JobId;
use thiserror::Error;

/// Result type alias for docjob operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for docjob
///
/// Every variant renders a human-readable message via `Display`, so a terminal
/// failure can always be surfaced to a user without further formatting.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "polling.interval")
        key: Option<String>,
    },

    /// Network failure (connect, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response that was not otherwise classified
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code returned by the backend
        status: u16,
        /// Response body as text (may be empty)
        body: String,
    },

    /// The run was cancelled through its cancellation controller
    #[error("operation cancelled")]
    Cancelled,

    /// The backend claimed an async response but the envelope was unusable
    #[error("async protocol error: {0}")]
    AsyncProtocol(String),

    /// The polled job reached a terminal error state
    #[error("{message}")]
    JobFailed {
        /// The job that failed
        job_id: JobId,
        /// Server-supplied error text, preserved verbatim
        message: String,
    },

    /// A body that asserted a JSON content type could not be parsed
    #[error("failed to parse {context}: {source}")]
    ResultParse {
        /// What was being parsed (e.g., "job result")
        context: String,
        /// Underlying JSON error
        source: serde_json::Error,
    },

    /// The pipeline finished without error but produced no usable output
    #[error("no output files produced: {0}")]
    EmptyOutput(String),

    /// Every file of a sequential batch failed
    #[error("all files failed: {}", failed.join(", "))]
    AllFilesFailed {
        /// Names of the files that failed, in processing order
        failed: Vec<String>,
    },

    /// The backend rejected specific inputs as invalid or corrupted
    #[error("Process failed due to invalid/corrupted file(s)")]
    RejectedFiles {
        /// Input ids reported by the backend
        file_ids: Vec<String>,
    },

    /// The caller supplied no processable input
    #[error("{0}")]
    InvalidInput(String),

    /// A result body was an archive that could not be expanded
    #[error("archive error: {0}")]
    Archive(String),

    /// A result body was an HTML error page instead of a document
    #[error("server returned an error page: {0}")]
    ErrorPage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a parse error for the given context
    pub(crate) fn parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        Error::ResultParse {
            context: context.into(),
            source,
        }
    }

    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Network(_) => "network_error",
            Error::Http { .. } => "http_error",
            Error::Cancelled => "cancelled",
            Error::AsyncProtocol(_) => "async_protocol_error",
            Error::JobFailed { .. } => "job_failed",
            Error::ResultParse { .. } => "result_parse_error",
            Error::EmptyOutput(_) => "empty_output",
            Error::AllFilesFailed { .. } => "all_files_failed",
            Error::RejectedFiles { .. } => "rejected_files",
            Error::InvalidInput(_) => "invalid_input",
            Error::Archive(_) => "archive_error",
            Error::ErrorPage(_) => "error_page",
            Error::Io(_) => "io_error",
        }
    }

    /// Message suitable for direct display to a user
    ///
    /// Job failures return the server text untouched; everything else uses `Display`.
    pub fn user_message(&self) -> String {
        match self {
            Error::JobFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// True if this error is the cancellation signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// True for network failures and unclassified non-2xx responses
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Http { .. })
    }

    /// HTTP status code carried by the error, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error() -> Error {
        let source = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        Error::parse("job result", source)
    }

    /// Returns (Error, expected_error_code) for every variant constructible without I/O.
    fn all_error_variants() -> Vec<(Error, &'static str)> {
        vec![
            (
                Error::Config {
                    message: "bad value".into(),
                    key: Some("polling.interval".into()),
                },
                "config_error",
            ),
            (
                Error::Http {
                    status: 500,
                    body: "boom".into(),
                },
                "http_error",
            ),
            (Error::Cancelled, "cancelled"),
            (
                Error::AsyncProtocol("missing jobId".into()),
                "async_protocol_error",
            ),
            (
                Error::JobFailed {
                    job_id: JobId::from("j-1"),
                    message: "Out of memory".into(),
                },
                "job_failed",
            ),
            (parse_error(), "result_parse_error"),
            (Error::EmptyOutput("compress".into()), "empty_output"),
            (
                Error::AllFilesFailed {
                    failed: vec!["a.pdf".into()],
                },
                "all_files_failed",
            ),
            (
                Error::RejectedFiles {
                    file_ids: vec!["id".into()],
                },
                "rejected_files",
            ),
            (Error::InvalidInput("No files selected".into()), "invalid_input"),
            (Error::Archive("corrupt".into()), "archive_error"),
            (Error::ErrorPage("<html>".into()), "error_page"),
            (
                Error::Io(std::io::Error::other("disk gone")),
                "io_error",
            ),
        ]
    }

    #[test]
    fn every_variant_has_its_error_code() {
        for (error, expected) in all_error_variants() {
            assert_eq!(error.error_code(), expected, "wrong code for {error:?}");
        }
    }

    #[test]
    fn every_variant_has_a_non_empty_message() {
        for (error, _) in all_error_variants() {
            assert!(
                !error.user_message().trim().is_empty(),
                "{error:?} must carry a displayable message"
            );
        }
    }

    #[test]
    fn job_failed_message_is_verbatim() {
        let error = Error::JobFailed {
            job_id: JobId::from("j-1"),
            message: "Job was cancelled by user".into(),
        };
        assert_eq!(error.user_message(), "Job was cancelled by user");
        assert_eq!(error.to_string(), "Job was cancelled by user");
    }

    #[test]
    fn all_files_failed_lists_names() {
        let error = Error::AllFilesFailed {
            failed: vec!["a.pdf".into(), "b.pdf".into()],
        };
        assert_eq!(error.to_string(), "all files failed: a.pdf, b.pdf");
    }

    #[test]
    fn classification_helpers() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Cancelled.is_transport());
        let http = Error::Http {
            status: 503,
            body: String::new(),
        };
        assert!(http.is_transport());
        assert_eq!(http.http_status(), Some(503));
        assert_eq!(Error::EmptyOutput("x".into()).http_status(), None);
    }
}
