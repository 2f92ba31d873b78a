//! The job execution pipeline
//!
//! A run moves through these stages:
//! 1. [`JobRunner`] submits the form with the async flag set
//! 2. a binary reply is a synchronous result; a `{jobId}` reply is polled by [`JobPoller`]
//! 3. [`ResultFetcher`] retrieves and classifies the result of a completed job
//! 4. blobs go through [`ResponseProcessor`], manifests through [`MultiFileDownloader`]
//!
//! [`BatchOrchestrator`] drives the runner over a set of inputs, either one job
//! per file or one combined job.

mod batch;
mod download;
mod operation;
mod poller;
mod response;
mod result;
mod runner;

pub use batch::BatchOrchestrator;
pub use download::{FALLBACK_FILE_NAME, MultiFileDownloader};
pub use operation::{Operation, ProcessingMode};
pub use poller::JobPoller;
pub use response::{OutputNaming, ResponseHandler, ResponseProcessor, SniffingHandler, ZipExpander};
pub use result::{ResultFetcher, ResultPayload, envelope_message};
pub use runner::{JobRequest, JobRunner};
