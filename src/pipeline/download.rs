//! Downloads for multi-file job results

use crate::cancel::{CancellationController, cancellable};
use crate::config::{Config, RetryConfig};
use crate::error::Result;
use crate::retry::with_retry;
use crate::transport::{JobTransport, RawResponse};
use crate::types::{DEFAULT_CONTENT_TYPE, JobResultFileMeta, OutputFile};
use std::sync::Arc;

/// Name used when neither the manifest nor the response names a file
pub const FALLBACK_FILE_NAME: &str = "download";

/// Downloads every file listed in a result manifest
///
/// The manifest is one atomic job output: if any download fails, the whole
/// call fails and no partial list is returned.
#[derive(Clone)]
pub struct MultiFileDownloader {
    transport: Arc<dyn JobTransport>,
    retry: RetryConfig,
}

impl MultiFileDownloader {
    /// Create a downloader using the retry settings of `config`
    pub fn new(transport: Arc<dyn JobTransport>, config: &Config) -> Self {
        Self {
            transport,
            retry: config.retry.clone(),
        }
    }

    /// Download `files` in manifest order
    pub async fn download_all(
        &self,
        files: &[JobResultFileMeta],
        cancel: &CancellationController,
    ) -> Result<Vec<OutputFile>> {
        let mut outputs = Vec::with_capacity(files.len());

        for (index, meta) in files.iter().enumerate() {
            let response = with_retry(&self.retry, cancel, || {
                cancellable(cancel, self.transport.download_file(&meta.file_id))
            })
            .await
            .inspect_err(|e| {
                if !e.is_cancelled() {
                    tracing::warn!(
                        file_id = %meta.file_id,
                        index,
                        total = files.len(),
                        error = %e,
                        "result file download failed, discarding manifest"
                    );
                }
            })?;

            outputs.push(materialize(meta, response));
        }

        tracing::debug!(files = outputs.len(), "downloaded all result files");
        Ok(outputs)
    }
}

/// Resolve name and type for one downloaded file
///
/// Name: manifest, then `Content-Disposition`, then [`FALLBACK_FILE_NAME`].
/// Type: manifest, then `Content-Type`, then [`DEFAULT_CONTENT_TYPE`].
fn materialize(meta: &JobResultFileMeta, response: RawResponse) -> OutputFile {
    let name = Some(meta.file_name.trim())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .or_else(|| response.filename())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());

    let content_type = Some(meta.content_type.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| response.content_type.clone())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

    OutputFile::new(name, content_type, response.body)
}
