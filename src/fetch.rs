//! HTTP fetch primitive.
//!
//! The assembler only needs `fetch(url) -> { status, Content-Length, body }`.
//! [`Fetcher`] is that seam; [`ReqwestFetcher`] is the real implementation
//! and tests substitute in-memory stubs.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;

/// Default per-request timeout for segment downloads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A response body delivered chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Why a fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The server answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The request or the body stream failed.
    #[error("network error: {0}")]
    Network(String),

    /// The body ended before the declared `Content-Length`.
    #[error("body truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: u64, received: u64 },
}

/// A successful response whose body has not been read yet.
pub struct FetchResponse {
    /// Declared `Content-Length`, if the server sent one.
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl FetchResponse {
    /// Wrap an in-memory body, declaring its length.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            content_length: Some(bytes.len() as u64),
            body: futures::stream::once(async move { Ok::<_, FetchError>(bytes) }).boxed(),
        }
    }
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Issue a GET for `url`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Resolve to the response head once a success status is known.
    ///
    /// Non-success statuses are reported as [`FetchError::Status`].
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// [`Fetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });
        Self { client }
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        Ok(FetchResponse {
            content_length: response.content_length(),
            body: response
                .bytes_stream()
                .map_err(|e| FetchError::Network(e.to_string()))
                .boxed(),
        })
    }
}
