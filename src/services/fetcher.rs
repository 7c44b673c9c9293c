use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

const USER_AGENT: &str = "image-describer/0.1 (+record captioning worker)";

/// Default cap on a downloaded body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Retrieves raw bytes for an absolute http(s) URL.
///
/// Implementations never retry; every transport, DNS, TLS and status problem
/// comes back as a single `FetchError`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// `ResourceFetcher` over a shared reqwest client with a fixed per-call
/// timeout and a cap on body size.
pub struct HttpFetcher {
    http: Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Request)?;

        Ok(Self::from_client(http))
    }

    /// Wrap an already configured client. The client's own timeout applies.
    pub fn from_client(http: Client) -> Self {
        Self {
            http,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let mut response = self
            .http
            .get(parsed)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::TooLarge { limit });
        }

        // Content-Length may be absent or wrong, so enforce the cap while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(FetchError::from_transport)? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server responded with {0}")]
    Status(StatusCode),

    #[error("Response body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl FetchError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Request(err)
        }
    }
}
