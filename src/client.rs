//! High-level client tying configuration, transport and events together

use crate::cancel::CancellationController;
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{
    BatchOrchestrator, JobPoller, JobRequest, JobRunner, MultiFileDownloader, Operation,
    ResultFetcher,
};
use crate::transport::{HttpTransport, JobTransport};
use crate::types::{BatchOutcome, Event, InputFile, OutputFile};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Entry point for running document jobs against a backend
///
/// Cheap to clone; clones share the transport and the event channel.
#[derive(Clone)]
pub struct JobClient {
    transport: Arc<dyn JobTransport>,
    config: Arc<Config>,
    event_tx: broadcast::Sender<Event>,
}

impl std::fmt::Debug for JobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobClient")
            .field("base_url", &self.config.server.base_url)
            .field("subscribers", &self.event_tx.receiver_count())
            .finish()
    }
}

impl JobClient {
    /// Create a client talking HTTP to `config.server.base_url`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::build(Arc::new(transport), config))
    }

    /// Create a client over a custom transport
    pub fn with_transport(config: Config, transport: Arc<dyn JobTransport>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(transport, config))
    }

    fn build(transport: Arc<dyn JobTransport>, config: Config) -> Self {
        let (event_tx, _rx) = broadcast::channel(config.event_capacity);
        tracing::debug!(base_url = %config.server.base_url, "job client ready");
        Self {
            transport,
            config: Arc::new(config),
            event_tx,
        }
    }

    /// Subscribe to pipeline events
    ///
    /// Each subscriber receives every event emitted after it subscribed. A
    /// subscriber that falls more than `event_capacity` events behind gets
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Pipeline events as a stream; lagged gaps are logged and skipped
    pub fn event_stream(&self) -> impl tokio_stream::Stream<Item = Event> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event subscriber lagged");
                None
            }
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Status poller sharing this client's transport
    pub fn poller(&self) -> JobPoller {
        JobPoller::new(self.transport.clone(), &self.config)
    }

    /// Result fetcher sharing this client's transport
    pub fn result_fetcher(&self) -> ResultFetcher {
        ResultFetcher::new(self.transport.clone(), &self.config)
    }

    /// Manifest downloader sharing this client's transport
    pub fn downloader(&self) -> MultiFileDownloader {
        MultiFileDownloader::new(self.transport.clone(), &self.config)
    }

    /// Single-request runner publishing to this client's events
    pub fn runner(&self) -> JobRunner {
        JobRunner::new(
            self.transport.clone(),
            self.config.clone(),
            self.event_tx.clone(),
        )
    }

    /// Batch orchestrator publishing to this client's events
    pub fn orchestrator(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(self.runner(), self.event_tx.clone())
    }

    /// Run `operation` over `files`
    pub async fn execute(
        &self,
        operation: &Operation,
        files: &[InputFile],
        cancel: &CancellationController,
    ) -> Result<BatchOutcome> {
        self.orchestrator().run(operation, files, cancel).await
    }

    /// Run `operation` once over exactly `files`, without batch bookkeeping
    pub async fn run_once(
        &self,
        operation: &Operation,
        files: &[InputFile],
        cancel: &CancellationController,
    ) -> Result<Vec<OutputFile>> {
        self.runner()
            .run(JobRequest::for_operation(operation, files), cancel)
            .await
    }
}
