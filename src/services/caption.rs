use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Longest edge sent to the model. Larger images are downscaled first.
pub const MAX_IMAGE_EDGE: u32 = 768;

const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";

const CAPTION_PROMPT: &str =
    "Describe this image in one short sentence. Reply with the caption only.";

/// Turns image bytes into a natural-language caption.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    async fn describe(&self, image_bytes: &[u8]) -> Result<String, DescribeError>;
}

/// Decode raw bytes as an image, bound its size and re-encode it as PNG.
pub fn prepare_image(image_bytes: &[u8]) -> Result<Vec<u8>, DescribeError> {
    let decoded = image::load_from_memory(image_bytes).map_err(DescribeError::Decode)?;

    let resized = if decoded.width() > MAX_IMAGE_EDGE || decoded.height() > MAX_IMAGE_EDGE {
        decoded.thumbnail(MAX_IMAGE_EDGE, MAX_IMAGE_EDGE)
    } else {
        decoded
    };

    // PNG cannot hold every decoded colour type (e.g. float buffers)
    let normalized = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut out = Vec::new();
    normalized
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(DescribeError::Encode)?;
    Ok(out)
}

/// Run CPU-bound image work on the blocking pool. A panic there comes back
/// as `DescribeError::Worker`.
async fn run_blocking<T, F>(work: F) -> Result<T, DescribeError>
where
    F: FnOnce() -> Result<T, DescribeError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| DescribeError::Worker(e.to_string()))?
}

/// Client for a Cloudflare Workers AI image-to-text model.
pub struct WorkersAiClient {
    http: Client,
    api_base: String,
    account_id: String,
    api_token: String,
    model: String,
}

#[derive(Deserialize)]
struct CaptionResponse {
    result: CaptionResult,
}

#[derive(Deserialize)]
struct CaptionResult {
    description: String,
}

impl WorkersAiClient {
    pub fn new(
        account_id: &str,
        api_token: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, DescribeError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DescribeError::Http)?;

        Ok(Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
            model: model.to_string(),
        })
    }

    /// Point the client at a different API root.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Replace the underlying HTTP client.
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    fn run_url(&self) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.api_base, self.account_id, self.model
        )
    }

    async fn caption_png(&self, png: &[u8]) -> Result<String, DescribeError> {
        let request_body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(png),
            "prompt": CAPTION_PROMPT,
            "max_tokens": 64
        });

        let response = self
            .http
            .post(self.run_url())
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await
            .map_err(DescribeError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DescribeError::Status(status));
        }

        let body = response.bytes().await.map_err(DescribeError::Http)?;
        let parsed: CaptionResponse =
            serde_json::from_slice(&body).map_err(DescribeError::Response)?;

        let caption = parsed.result.description.trim();
        if caption.is_empty() {
            return Err(DescribeError::EmptyCaption);
        }
        Ok(caption.to_string())
    }
}

#[async_trait]
impl DescriptionGenerator for WorkersAiClient {
    async fn describe(&self, image_bytes: &[u8]) -> Result<String, DescribeError> {
        let owned = image_bytes.to_vec();
        let png = run_blocking(move || prepare_image(&owned)).await?;
        self.caption_png(&png).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DescribeError {
    #[error("Could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Could not re-encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Workers AI responded with {0}")]
    Status(StatusCode),

    #[error("Failed to parse Workers AI response: {0}")]
    Response(#[source] serde_json::Error),

    #[error("Model returned an empty caption")]
    EmptyCaption,

    #[error("Image preparation task failed: {0}")]
    Worker(String),
}
