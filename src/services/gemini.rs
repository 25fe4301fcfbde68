//! Gemini service for Google Gemini API interactions
//!
//! This module provides the remote operations the failover invoker runs
//! against the key pool: text generation for the SEO report and image
//! regeneration for thumbnails. Each call uses exactly the key it is given;
//! rotation lives in `services::failover`.

use crate::schemas::gemini::{models, GeminiError, GeminiRequest, GeminiResponse};
use crate::services::backend_pool::Credential;
use crate::services::failover::{ErrorSignal, RemoteCall};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// MIME type sent for source thumbnails
const SOURCE_IMAGE_MIME: &str = "image/jpeg";

/// MIME type of the returned data URL
const OUTPUT_IMAGE_MIME: &str = "image/png";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when calling the Gemini API
#[derive(Error, Debug)]
pub enum GeminiServiceError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {code} - {message}")]
    ApiError { code: i32, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("The model returned no content")]
    EmptyResponse,

    #[error("Request blocked for safety reasons: {0}")]
    Blocked(String),

    #[error("The model answered with text instead of an image: {0}")]
    TextInsteadOfImage(String),

    #[error("No image data in the model response")]
    NoImage,

    #[error("Failed to download source image {url} (HTTP {status})")]
    ImageDownload { url: String, status: u16 },
}

impl ErrorSignal for GeminiServiceError {
    fn status_code(&self) -> Option<u16> {
        match self {
            GeminiServiceError::ApiError { code, .. } => u16::try_from(*code).ok(),
            GeminiServiceError::HttpError(e) => e.status().map(|s| s.as_u16()),
            // Image host failures say nothing about the key
            _ => None,
        }
    }
}

// ============================================================================
// Gemini Client
// ============================================================================

/// Configuration for the Gemini client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL (default: generativelanguage.googleapis.com)
    pub base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_seconds: 120,
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// HTTP client for the Gemini REST API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: Option<String>,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        tracing::info!(
            timeout_seconds = config.timeout_seconds,
            base_url = config.base_url.as_deref().unwrap_or(GEMINI_API_BASE),
            "Initialized Gemini client"
        );

        Ok(Self {
            client,
            base_url: config.base_url,
        })
    }

    /// Get the base URL
    fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(GEMINI_API_BASE)
    }

    /// Generate content (non-streaming) with one key
    pub async fn generate_content(
        &self,
        credential: &Credential,
        model: &str,
        request: &GeminiRequest,
    ) -> Result<GeminiResponse, GeminiServiceError> {
        let url = format!("{}/models/{}:generateContent", self.base_url(), model);

        tracing::debug!(
            model = %model,
            url = %url,
            credential = %credential,
            "Calling Gemini generateContent API"
        );

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", credential.api_key())
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(parse_api_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse Gemini response");
            GeminiServiceError::ParseError(e.to_string())
        })
    }

    /// Download an image and return it base64-encoded
    ///
    /// Not tied to any key, so callers do this once before invoking.
    pub async fn fetch_image_base64(&self, url: &str) -> Result<String, GeminiServiceError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GeminiServiceError::ImageDownload {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await?;
        tracing::debug!(url = %url, bytes = bytes.len(), "Downloaded source image");
        Ok(STANDARD.encode(&bytes))
    }
}

/// Turn a non-2xx body into `ApiError`, preferring the Gemini error envelope
fn parse_api_error(status: u16, body: &str) -> GeminiServiceError {
    match serde_json::from_str::<GeminiError>(body) {
        Ok(envelope) => GeminiServiceError::ApiError {
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => GeminiServiceError::ApiError {
            code: i32::from(status),
            message: body.to_string(),
        },
    }
}

// ============================================================================
// Text Generation
// ============================================================================

/// Request for `GenerateText`
#[derive(Debug, Clone)]
pub struct TextRequest {
    pub model: String,
    pub prompt: String,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: models::GEMINI_2_5_FLASH.to_string(),
            prompt: prompt.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Generates a text answer, e.g. the SEO analysis report
#[derive(Debug, Clone)]
pub struct GenerateText {
    client: GeminiClient,
}

impl GenerateText {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteCall for GenerateText {
    type Request = TextRequest;
    type Output = String;
    type Error = GeminiServiceError;

    fn name(&self) -> &str {
        "generate_text"
    }

    async fn call(
        &self,
        credential: &Credential,
        request: &TextRequest,
    ) -> Result<String, GeminiServiceError> {
        let response = self
            .client
            .generate_content(credential, &request.model, &GeminiRequest::text(&request.prompt))
            .await?;
        response_text(&response)
    }
}

fn response_text(response: &GeminiResponse) -> Result<String, GeminiServiceError> {
    if let Some(reason) = response.block_reason() {
        return Err(GeminiServiceError::Blocked(reason.to_string()));
    }
    response.text().ok_or(GeminiServiceError::EmptyResponse)
}

// ============================================================================
// Thumbnail Regeneration
// ============================================================================

/// Request for `RecreateThumbnail`
#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    pub model: String,
    /// Source image, base64-encoded JPEG
    pub image_base64: String,
    pub prompt: String,
}

impl ThumbnailRequest {
    pub fn new(image_base64: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: models::GEMINI_2_5_FLASH_IMAGE.to_string(),
            image_base64: image_base64.into(),
            prompt: prompt.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Regenerates a thumbnail from a source image and an instruction
///
/// Returns a `data:image/png;base64,...` URL.
#[derive(Debug, Clone)]
pub struct RecreateThumbnail {
    client: GeminiClient,
}

impl RecreateThumbnail {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteCall for RecreateThumbnail {
    type Request = ThumbnailRequest;
    type Output = String;
    type Error = GeminiServiceError;

    fn name(&self) -> &str {
        "recreate_thumbnail"
    }

    async fn call(
        &self,
        credential: &Credential,
        request: &ThumbnailRequest,
    ) -> Result<String, GeminiServiceError> {
        let body = GeminiRequest::image_edit(
            SOURCE_IMAGE_MIME,
            request.image_base64.as_str(),
            request.prompt.as_str(),
        );
        let response = self
            .client
            .generate_content(credential, &request.model, &body)
            .await?;
        image_data_url(&response)
    }
}

fn image_data_url(response: &GeminiResponse) -> Result<String, GeminiServiceError> {
    if response.candidates.is_empty() {
        return Err(match response.block_reason() {
            Some(reason) => GeminiServiceError::Blocked(reason.to_string()),
            None => GeminiServiceError::EmptyResponse,
        });
    }

    if let Some(image) = response.first_inline_data() {
        return Ok(format!("data:{};base64,{}", OUTPUT_IMAGE_MIME, image.data));
    }

    match response.text() {
        Some(text) if !text.trim().is_empty() => {
            Err(GeminiServiceError::TextInsteadOfImage(text.trim().to_string()))
        }
        _ => Err(GeminiServiceError::NoImage),
    }
}

/// Decode the payload of a `data:<mime>;base64,<data>` URL
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, GeminiServiceError> {
    let payload = data_url
        .split_once(";base64,")
        .map(|(_, data)| data)
        .ok_or_else(|| GeminiServiceError::ParseError("not a base64 data URL".to_string()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| GeminiServiceError::ParseError(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
