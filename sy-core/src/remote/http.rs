use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use super::ChunkRemote;
use crate::config::RetryPolicy;
use crate::error::{Result, SyError};
use crate::id::ChunkId;
use crate::protocol::{DIFF_PATH, DiffRequest, ErrorBody, Framing, UPLOAD_PATH};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for a `sy server` over HTTP.
pub struct HttpRemote {
    client: Client,
    base: String,
    framing: Framing,
    retry: RetryPolicy,
}

impl HttpRemote {
    pub fn new(api: &str, framing: Framing, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyError::Network(format!("failed to create client: {e}")))?;
        Ok(Self {
            client,
            base: api.trim_end_matches('/').to_string(),
            framing,
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Send, retrying connection failures, timeouts and transient 5xx
    /// with exponential backoff. 4xx answers are returned at once.
    async fn send<F>(&self, what: &str, make: F) -> Result<Response>
    where
        F: Fn() -> Result<RequestBuilder>,
    {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match make()?.send().await {
                Ok(resp) if is_transient_status(resp.status()) && attempt < attempts => {
                    format!("HTTP {}", resp.status())
                }
                Ok(resp) => return check_status(what, resp).await,
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < attempts => {
                    e.to_string()
                }
                Err(e) => return Err(SyError::Network(format!("{what}: {e}"))),
            };
            let delay = self.retry.delay(attempt);
            warn!(what, attempt, error = %failure, ?delay, "request failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

async fn check_status(what: &str, resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
    Err(SyError::Protocol(format!("{what}: HTTP {status}: {message}")))
}

impl ChunkRemote for HttpRemote {
    async fn diff(&self, chunks: &[ChunkId]) -> Result<Vec<ChunkId>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let req = DiffRequest::new(self.framing, chunks.to_vec());
        let body = req.to_json();
        let url = self.url(DIFF_PATH);
        let resp = self
            .send("diff", || Ok(self.client.post(&url).json(&body)))
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SyError::Network(format!("diff: cannot read body: {e}")))?;
        let unknown = req.read_response(&bytes)?;
        debug!(candidates = chunks.len(), unknown = unknown.len(), "diff");
        Ok(unknown)
    }

    async fn upload(&self, id: &ChunkId, bytes: Bytes) -> Result<()> {
        let url = self.url(&format!("{UPLOAD_PATH}/{id}"));
        self.send("upload", || {
            Ok(self
                .client
                .put(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes.clone()))
        })
        .await?;
        Ok(())
    }

    async fn upload_batch(&self, chunks: Vec<(ChunkId, Bytes)>) -> Result<()> {
        let url = self.url(UPLOAD_PATH);
        self.send("batch upload", || {
            let mut form = Form::new();
            for (id, bytes) in &chunks {
                // Bytes clones share the buffer, so a retry costs no copy
                let part = Part::stream_with_length(bytes.clone(), bytes.len() as u64)
                    .file_name(id.to_string())
                    .mime_str("application/octet-stream")
                    .map_err(|e| SyError::Network(format!("batch upload: {e}")))?;
                form = form.part(id.to_string(), part);
            }
            Ok(self.client.post(&url).multipart(form))
        })
        .await?;
        Ok(())
    }
}
