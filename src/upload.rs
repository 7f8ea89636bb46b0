//! Image host uploads
//!
//! Uploads go straight to the image host as an unsigned multipart POST.
//! They never pass through `ApiClient`: no bearer token, no cookies, no
//! global failure notification. The caller decides what to show.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Method;
use serde::Deserialize;
use thiserror::Error;

use crate::config::UploadConfig;
use crate::http::{ApiError, ApiRequest, FilePart, MultipartForm, Transport};

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("image host request failed: {0}")]
    Api(#[from] ApiError),

    #[error("image host response has no secure_url")]
    MissingSecureUrl,

    #[error("failed to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An image ready to be uploaded
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        Self {
            content_type: content_type_for(&file_name).map(str::to_string),
            file_name,
            bytes,
        }
    }

    /// Read an image from disk
    pub async fn read(path: &Path) -> Result<Self, UploadError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

/// Unauthenticated uploader for the image host
pub struct ImageUploader {
    transport: Arc<dyn Transport>,
    upload_url: String,
    upload_preset: String,
}

impl ImageUploader {
    pub fn new(
        transport: Arc<dyn Transport>,
        upload_url: impl Into<String>,
        upload_preset: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            upload_url: upload_url.into(),
            upload_preset: upload_preset.into(),
        }
    }

    /// Build an uploader from the `[upload]` config section
    pub fn from_config(config: &UploadConfig, transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, config.upload_url(), config.upload_preset.clone())
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Upload an image and return its public `secure_url`
    pub async fn upload(&self, image: ImageFile) -> Result<String, UploadError> {
        let size = image.bytes.len();
        let form = MultipartForm::new()
            .file(FilePart {
                field: "file".to_string(),
                file_name: image.file_name.clone(),
                content_type: image.content_type,
                bytes: image.bytes,
            })
            .text("upload_preset", self.upload_preset.clone());

        let request = ApiRequest::new(Method::POST, self.upload_url.clone())
            .multipart(form)
            .anonymous();

        tracing::debug!(file = %image.file_name, size, url = %self.upload_url, "uploading image");

        let raw = self
            .transport
            .send(request)
            .await
            .map_err(ApiError::NoResponse)?;
        if !raw.is_success() {
            return Err(ApiError::from_status(raw.status, &raw.body).into());
        }

        let response: UploadResponse =
            serde_json::from_slice(&raw.body).map_err(|e| ApiError::Decode(e.to_string()))?;
        let url = response
            .secure_url
            .filter(|u| !u.is_empty())
            .ok_or(UploadError::MissingSecureUrl)?;

        tracing::info!(file = %image.file_name, url = %url, "image uploaded");
        Ok(url)
    }
}
