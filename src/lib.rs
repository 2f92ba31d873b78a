//! # docjob
//!
//! Client-side orchestration of long-running document-processing jobs.
//!
//! A caller submits files to a backend operation. The backend either answers
//! with the result right away or with a job id that is polled to completion,
//! after which the result (a single blob, an error envelope, or a manifest of
//! several files) is fetched and normalized into [`OutputFile`]s.
//!
//! ## Design Philosophy
//!
//! docjob is designed to be:
//! - **Event-driven** - progress, queue position and failures are broadcast as [`Event`]s
//! - **Cancellable** - every request and every wait observes a [`CancellationController`]
//! - **Failure-isolating** - one bad file never aborts the rest of a batch
//! - **Transport-agnostic** - the HTTP client sits behind the [`JobTransport`] trait
//!
//! ## Quick Start
//!
//! ```no_run
//! use docjob::{CancellationController, Config, InputFile, JobClient, Operation};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = JobClient::new(Config::with_base_url("http://localhost:8080"))?;
//!
//!     let mut events = client.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let operation = Operation::new("compress", "/api/v1/misc/compress-pdf")
//!         .with_prefix("compressed_");
//!     let input = InputFile::new("1", "report.pdf", "application/pdf", std::fs::read("report.pdf")?);
//!
//!     let outcome = client
//!         .execute(&operation, &[input], &CancellationController::new())
//!         .await?;
//!     for file in outcome.output_files {
//!         std::fs::write(&file.name, &file.bytes)?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Cooperative cancellation
pub mod cancel;
/// High-level client
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Multipart form payloads
pub mod form;
/// Job execution pipeline
pub mod pipeline;
/// Retry logic with exponential backoff
pub mod retry;
/// Status normalization and the job state machine
pub mod status;
/// Backend transport
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use cancel::{CancellationController, cancellable};
pub use client::JobClient;
pub use config::{Config, PollingConfig, RetryConfig, ServerConfig};
pub use error::{Error, Result};
pub use form::{FormBuilder, FormFile, FormPayload, StandardForm};
pub use pipeline::{
    BatchOrchestrator, JobPoller, JobRequest, JobRunner, MultiFileDownloader, Operation,
    OutputNaming, ProcessingMode, ResponseHandler, ResponseProcessor, ResultFetcher,
    ResultPayload, SniffingHandler, ZipExpander,
};
pub use status::{RunState, derive_update, normalize_status};
pub use transport::{HttpTransport, JobTransport, RawResponse};
pub use types::{
    BatchOutcome, Event, InputFile, JobId, JobResultFileMeta, JobState, JobStatus, JobUpdate,
    OutputFile, ProcessingProgress, QueueInfo, SourceId,
};

/// Cancel `controller` when the process receives a termination signal.
///
/// Intended to be spawned next to a long batch so Ctrl+C stops it cleanly
/// (including best-effort cancellation of the server-side job).
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use docjob::{CancellationController, cancel_on_shutdown_signal};
///
/// #[tokio::main]
/// async fn main() {
///     let cancel = CancellationController::new();
///     tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));
///     // ... run a batch with `&cancel`
/// }
/// ```
pub async fn cancel_on_shutdown_signal(controller: CancellationController) {
    tokio::select! {
        _ = wait_for_signal() => controller.cancel(),
        _ = controller.token().cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
