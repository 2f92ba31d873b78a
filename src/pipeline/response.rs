//! Turning a single result body into output files
//!
//! [`ResponseProcessor`] applies the naming rules and either wraps the body
//! as one output or hands it to a [`ResponseHandler`]. Two handlers ship with
//! the crate:
//! - [`ZipExpander`] expands a zip body into its files
//! - [`SniffingHandler`] decides between PDF, zip and HTML error page by
//!   looking at the leading bytes

use crate::error::{Error, Result};
use crate::transport::RawResponse;
use crate::types::{DEFAULT_CONTENT_TYPE, InputFile, OutputFile};
use crate::utils::{content_type_for_filename, extension_for_content_type, truncate_body};

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// How output files are named
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputNaming {
    /// Prefix prepended to the original input name (e.g., "compressed_")
    pub prefix: String,
    /// Prefer the server's `Content-Disposition` filename over the prefixed name
    pub preserve_backend_filename: bool,
}

impl OutputNaming {
    /// Naming with the given prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            preserve_backend_filename: false,
        }
    }
}

/// Custom conversion of a result body into output files
///
/// A handler fully replaces the default pass-through. `default_name` is the
/// name the default would have used.
#[async_trait::async_trait]
pub trait ResponseHandler: Send + Sync {
    /// Convert `response` into output files
    async fn handle(
        &self,
        response: &RawResponse,
        inputs: &[InputFile],
        default_name: &str,
    ) -> Result<Vec<OutputFile>>;
}

/// Default single-blob processing
pub struct ResponseProcessor;

impl ResponseProcessor {
    /// Resolve the name of a single-blob output
    ///
    /// 1. server filename, when `preserve_backend_filename` is set
    /// 2. `{prefix}{name}` of the only input
    /// 3. server filename
    /// 4. `{prefix}output{ext}` with the extension of the content type
    pub fn output_name(response: &RawResponse, inputs: &[InputFile], naming: &OutputNaming) -> String {
        let server_name = response.filename();

        if naming.preserve_backend_filename
            && let Some(name) = server_name.clone()
        {
            return name;
        }

        if let [only] = inputs {
            return format!("{}{}", naming.prefix, only.name);
        }

        server_name.unwrap_or_else(|| {
            let ext = response
                .content_type
                .as_deref()
                .map(extension_for_content_type)
                .unwrap_or("");
            format!("{}output{}", naming.prefix, ext)
        })
    }

    /// Convert a result body into output files
    ///
    /// Without a handler the body becomes one output keeping the declared
    /// content type. An empty body yields no output.
    pub async fn process(
        response: &RawResponse,
        inputs: &[InputFile],
        naming: &OutputNaming,
        handler: Option<&dyn ResponseHandler>,
    ) -> Result<Vec<OutputFile>> {
        let name = Self::output_name(response, inputs, naming);

        if let Some(handler) = handler {
            return handler.handle(response, inputs, &name).await;
        }

        if response.body.is_empty() {
            tracing::debug!(name = %name, "result body is empty");
            return Ok(Vec::new());
        }

        Ok(vec![OutputFile::new(
            name,
            response
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            response.body.clone(),
        )])
    }
}

/// Expands zip result bodies into one output per contained file
///
/// Directory entries and entries with unsafe paths are skipped. Names are the
/// entry's file name without directories; types are guessed from extensions.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipExpander;

impl ZipExpander {
    /// Expand `bytes` synchronously
    pub fn expand(bytes: &[u8]) -> Result<Vec<OutputFile>> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
            .map_err(|e| Error::Archive(format!("failed to read ZIP archive: {e}")))?;

        let mut outputs = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| Error::Archive(format!("failed to read ZIP entry {i}: {e}")))?;

            if entry.is_dir() {
                continue;
            }

            let Some(name) = entry
                .enclosed_name()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .map(str::to_string)
            else {
                tracing::warn!(entry = i, "skipping ZIP entry with unsafe path");
                continue;
            };

            // The declared size is untrusted; grow the buffer as data arrives
            let mut content = Vec::new();
            let copied = std::io::copy(&mut entry, &mut content)
                .map_err(|e| Error::Archive(format!("failed to extract {name}: {e}")))?;
            if copied != entry.size() {
                return Err(Error::Archive(format!(
                    "{name} declares {} bytes but holds {copied}",
                    entry.size()
                )));
            }
            let content_type = content_type_for_filename(&name).to_string();
            outputs.push(OutputFile::new(name, content_type, content));
        }

        tracing::debug!(files = outputs.len(), "expanded ZIP result");
        Ok(outputs)
    }
}

#[async_trait::async_trait]
impl ResponseHandler for ZipExpander {
    async fn handle(
        &self,
        response: &RawResponse,
        _inputs: &[InputFile],
        _default_name: &str,
    ) -> Result<Vec<OutputFile>> {
        let body = response.body.clone();
        tokio::task::spawn_blocking(move || Self::expand(&body))
            .await
            .map_err(|e| Error::Archive(format!("ZIP expansion task failed: {e}")))?
    }
}

/// Detects the body format from its leading bytes
///
/// `%PDF` is a single PDF named like the default output, a zip local header
/// is expanded with [`ZipExpander`], HTML is an [`Error::ErrorPage`], and
/// anything else passes through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct SniffingHandler;

fn looks_like_html(body: &[u8]) -> bool {
    let head: Vec<u8> = body
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take(64)
        .map(u8::to_ascii_lowercase)
        .collect();
    head.starts_with(b"<!doctype html") || head.starts_with(b"<html")
}

#[async_trait::async_trait]
impl ResponseHandler for SniffingHandler {
    async fn handle(
        &self,
        response: &RawResponse,
        inputs: &[InputFile],
        default_name: &str,
    ) -> Result<Vec<OutputFile>> {
        let body = &response.body;

        if body.starts_with(PDF_MAGIC) {
            let name = if default_name.to_ascii_lowercase().ends_with(".pdf") {
                default_name.to_string()
            } else {
                format!("{default_name}.pdf")
            };
            return Ok(vec![OutputFile::new(name, "application/pdf", body.clone())]);
        }

        if body.starts_with(ZIP_MAGIC) {
            return ZipExpander.handle(response, inputs, default_name).await;
        }

        if looks_like_html(body) {
            let text = String::from_utf8_lossy(body);
            return Err(Error::ErrorPage(truncate_body(&text, 200)));
        }

        if body.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![OutputFile::new(
            default_name,
            response
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            body.clone(),
        )])
    }
}
