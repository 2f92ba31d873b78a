//! Configuration types for docjob

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backend location and HTTP client settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the backend (default: "http://localhost:8080")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the job resource; status is `{job_path}/{jobId}` (default: "/api/v1/general/job")
    #[serde(default = "default_job_path")]
    pub job_path: String,

    /// Path of the file resource; downloads are `{files_path}/{fileId}` (default: "/api/v1/general/files")
    #[serde(default = "default_files_path")]
    pub files_path: String,

    /// Per-request timeout (default: 300 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// TCP connect timeout (default: 10 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            job_path: default_job_path(),
            files_path: default_files_path(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Job status polling behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fixed wait between status requests (default: 1000 ms)
    #[serde(default = "default_poll_interval", with = "millis_serde")]
    pub interval: Duration,

    /// Progress reported for processing jobs when the server omits one (default: 10)
    #[serde(default = "default_fallback_progress")]
    pub fallback_progress: u8,

    /// Ask the server to cancel a still-running job when the run is cancelled (default: true)
    #[serde(default = "default_true")]
    pub cancel_remote_jobs: bool,

    /// Upper bound for the remote cancel request (default: 5 seconds)
    #[serde(default = "default_remote_cancel_timeout", with = "duration_serde")]
    pub remote_cancel_timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            fallback_progress: default_fallback_progress(),
            cancel_remote_jobs: true,
            remote_cancel_timeout: default_remote_cancel_timeout(),
        }
    }
}

/// Retry configuration for transient failures of idempotent requests
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 500 ms)
    #[serde(default = "default_initial_delay", with = "millis_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 10 seconds)
    #[serde(default = "default_max_delay", with = "millis_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for [`JobClient`](crate::JobClient)
///
/// Fields are organized into sub-configs:
/// - [`server`](ServerConfig): backend location and HTTP timeouts
/// - [`polling`](PollingConfig): status polling and remote cancellation
/// - [`retry`](RetryConfig): backoff for idempotent requests
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Backend location and HTTP client settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Status polling behavior
    #[serde(default)]
    pub polling: PollingConfig,

    /// Retry behavior for status, result and file requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Capacity of the event broadcast channel (default: 1000)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            polling: PollingConfig::default(),
            retry: RetryConfig::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Configuration pointing at the given backend, defaults elsewhere
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = url::Url::parse(&self.server.base_url) {
            return Err(config_error(
                format!("invalid base URL '{}': {}", self.server.base_url, e),
                "server.base_url",
            ));
        }
        if !self.server.job_path.starts_with('/') {
            return Err(config_error(
                "job path must start with '/'",
                "server.job_path",
            ));
        }
        if !self.server.files_path.starts_with('/') {
            return Err(config_error(
                "files path must start with '/'",
                "server.files_path",
            ));
        }
        if self.polling.interval.is_zero() {
            return Err(config_error(
                "poll interval must be greater than zero",
                "polling.interval",
            ));
        }
        if self.polling.fallback_progress > 100 {
            return Err(config_error(
                "fallback progress must be between 0 and 100",
                "polling.fallback_progress",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(config_error(
                "backoff multiplier must be at least 1.0",
                "retry.backoff_multiplier",
            ));
        }
        if self.event_capacity == 0 {
            return Err(config_error(
                "event capacity must be greater than zero",
                "event_capacity",
            ));
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "http://localhost:8080".into()
}

fn default_job_path() -> String {
    "/api/v1/general/job".into()
}

fn default_files_path() -> String {
    "/api/v1/general/files".into()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("docjob/{}", env!("CARGO_PKG_VERSION"))
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_fallback_progress() -> u8 {
    10
}

fn default_remote_cancel_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_event_capacity() -> usize {
    1000
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
