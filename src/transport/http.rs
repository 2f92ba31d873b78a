//! reqwest-backed [`JobTransport`]

use super::{JobTransport, RawResponse};
use crate::config::{Config, ServerConfig};
use crate::error::{Error, Result};
use crate::form::FormPayload;
use crate::types::JobId;
use crate::utils::truncate_body;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderName};
use reqwest::multipart::{Form, Part};
use url::Url;

/// HTTP transport for the job API
///
/// Credentials are not handled here; pass a client with default headers via
/// [`HttpTransport::with_client`] when the backend needs them.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    job_path: String,
    files_path: String,
}

impl HttpTransport {
    /// Build a transport with its own client, configured from `config.server`
    pub fn new(config: &Config) -> Result<Self> {
        let server = &config.server;
        let client = reqwest::Client::builder()
            .timeout(server.request_timeout)
            .connect_timeout(server.connect_timeout)
            .user_agent(server.user_agent.clone())
            .build()?;
        Self::with_client(client, server)
    }

    /// Use a caller-supplied client (e.g., one that injects auth headers)
    pub fn with_client(client: reqwest::Client, server: &ServerConfig) -> Result<Self> {
        let base_url = Url::parse(&server.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL '{}': {}", server.base_url, e),
            key: Some("server.base_url".to_string()),
        })?;

        Ok(Self {
            client,
            base_url,
            job_path: server.job_path.trim_end_matches('/').to_string(),
            files_path: server.files_path.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a backend-relative path (may include a query string)
    fn url(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };
        Url::parse(&joined).map_err(|e| Error::Config {
            message: format!("cannot build request URL '{joined}': {e}"),
            key: None,
        })
    }

    fn job_url(&self, job_id: &JobId, suffix: &str) -> Result<Url> {
        let id = urlencoding::encode(job_id.as_str());
        self.url(&format!("{}/{}{}", self.job_path, id, suffix))
    }

    fn build_form(form: &FormPayload) -> Result<Form> {
        let mut multipart = Form::new();
        for (name, value) in &form.fields {
            multipart = multipart.text(name.clone(), value.clone());
        }
        for file in &form.files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)?;
            multipart = multipart.part(file.field.clone(), part);
        }
        Ok(multipart)
    }

    /// Turn a response into a [`RawResponse`], mapping non-2xx to [`Error::Http`]
    async fn read(response: reqwest::Response) -> Result<RawResponse> {
        let status = response.status();
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header(CONTENT_TYPE);
        let content_disposition = header(CONTENT_DISPOSITION);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(
                status = status.as_u16(),
                body = %truncate_body(&body, 200),
                "backend returned an error status"
            );
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?.to_vec();
        Ok(RawResponse {
            status: status.as_u16(),
            content_type,
            content_disposition,
            body,
        })
    }

    async fn get(&self, url: Url) -> Result<RawResponse> {
        let response = self.client.get(url).send().await?;
        Self::read(response).await
    }
}

#[async_trait::async_trait]
impl JobTransport for HttpTransport {
    async fn submit(&self, endpoint: &str, form: &FormPayload) -> Result<RawResponse> {
        let url = self.url(endpoint)?;
        tracing::debug!(
            %url,
            files = form.files.len(),
            bytes = form.total_file_bytes(),
            "submitting job"
        );
        let response = self
            .client
            .post(url)
            .multipart(Self::build_form(form)?)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn job_status(&self, job_id: &JobId) -> Result<RawResponse> {
        self.get(self.job_url(job_id, "")?).await
    }

    async fn job_result(&self, job_id: &JobId) -> Result<RawResponse> {
        self.get(self.job_url(job_id, "/result")?).await
    }

    async fn download_file(&self, file_id: &str) -> Result<RawResponse> {
        let id = urlencoding::encode(file_id);
        self.get(self.url(&format!("{}/{}", self.files_path, id))?)
            .await
    }

    async fn cancel_job(&self, job_id: &JobId) -> Result<()> {
        let response = self
            .client
            .delete(self.job_url(job_id, "")?)
            .send()
            .await?;
        Self::read(response).await.map(|_| ())
    }
}
