use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::Deserialize;
use verdant_core::config::UploadSettings;
use verdant_core::ClientError;

use crate::transport::ApiResponse;

/// An image picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read an image from disk, guessing the content type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| ClientError::invalid("image", format!("Cannot read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let content_type = mime_guess::from_path(path)
            .first_raw()
            .filter(|mime| mime.starts_with("image/"));
        Ok(Self {
            file_name,
            content_type: content_type.map(str::to_string),
            bytes: Bytes::from(bytes),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub type UploadFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ClientError>> + Send + 'a>>;

/// Stores an image and returns its hosted URL.
pub trait ImageUploader: Send + Sync + 'static {
    fn upload(&self, image: ImageFile) -> UploadFuture<'_>;
}

#[derive(Debug, Deserialize)]
struct HostedImage {
    display_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    data: HostedImage,
}

/// Uploads to an imgbb-compatible image host: multipart `image` field,
/// API key in the `key` query parameter, `{data: {display_url}}` back.
#[derive(Clone)]
pub struct HostedImageUploader {
    client: reqwest::Client,
    url: Url,
    api_key: Option<String>,
}

impl HostedImageUploader {
    pub fn new(settings: &UploadSettings, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: settings.url.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    async fn send(&self, image: ImageFile) -> Result<String, ClientError> {
        if image.is_empty() {
            return Err(ClientError::invalid("image", "Image is required"));
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ClientError::invalid("upload.api_key", "Image host API key is not configured"))?;

        let mut part = Part::bytes(image.bytes.to_vec()).file_name(image.file_name.clone());
        if let Some(content_type) = &image.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| ClientError::invalid("image", format!("Invalid content type: {e}")))?;
        }
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(self.url.clone())
            .query(&[("key", api_key)])
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("Image upload failed: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(format!("Failed to read upload response: {e}")))?;

        let envelope: UploadEnvelope = ApiResponse { status, body }.error_for_status()?.json()?;
        tracing::debug!(file = %image.file_name, url = %envelope.data.display_url, "image uploaded");
        Ok(envelope.data.display_url)
    }
}

impl ImageUploader for HostedImageUploader {
    fn upload(&self, image: ImageFile) -> UploadFuture<'_> {
        Box::pin(self.send(image))
    }
}
