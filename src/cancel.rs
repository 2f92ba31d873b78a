//! Cooperative cancellation for job runs
//!
//! A [`CancellationController`] is owned by the caller and handed to a run.
//! Every network call and every sleep of the run is raced against it through
//! [`cancellable`], so cancellation is observed promptly and surfaces as
//! [`Error::Cancelled`].

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Caller-held handle that aborts one run (or one batch) when triggered
///
/// Cloning yields a handle to the same signal. Once cancelled, it stays cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancellationController {
    token: CancellationToken,
}

impl CancellationController {
    /// Create a fresh, untriggered controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger cancellation; idempotent
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("cancellation requested");
        }
        self.token.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Underlying token, for integrating with other tokio-util based code
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Return `Err(Cancelled)` if cancellation has been requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Wait for `duration`, returning early with `Err(Cancelled)` if triggered
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        cancellable(self, async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

/// Race `fut` against the controller
///
/// Cancellation wins ties, so a run cancelled while a request is completing
/// still reports [`Error::Cancelled`].
pub async fn cancellable<T, F>(controller: &CancellationController, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = controller.token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
