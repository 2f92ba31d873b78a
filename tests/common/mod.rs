//! Common test utilities for docjob integration tests
//!
//! Each test starts its own wiremock backend; nothing here needs network
//! access beyond localhost.

#![allow(dead_code)]

use docjob::{Config, Event, InputFile, JobClient};
use std::time::Duration;
use tokio::sync::broadcast;
use wiremock::MockServer;

/// Default job resource path of the backend
pub const JOB_PATH: &str = "/api/v1/general/job";

/// Default file resource path of the backend
pub const FILES_PATH: &str = "/api/v1/general/files";

/// Config pointed at `server` with short poll and retry delays
pub fn fast_config(server: &MockServer) -> Config {
    let mut config = Config::with_base_url(server.uri());
    config.polling.interval = Duration::from_millis(20);
    config.polling.remote_cancel_timeout = Duration::from_secs(2);
    config.retry.initial_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(50);
    config.retry.jitter = false;
    config
}

/// HTTP client for `server`
pub fn client_for(server: &MockServer) -> JobClient {
    JobClient::new(fast_config(server)).expect("valid test config")
}

/// Non-empty PDF input
pub fn pdf_input(id: &str, name: &str) -> InputFile {
    InputFile::new(
        id,
        name,
        "application/pdf",
        format!("%PDF-1.7 {name}").into_bytes(),
    )
}

/// Everything currently buffered on `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}

/// Job status of the polled job in emission order
pub fn job_states(events: &[Event]) -> Vec<docjob::JobState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::JobUpdate(update) => Some(update.status),
            _ => None,
        })
        .collect()
}
