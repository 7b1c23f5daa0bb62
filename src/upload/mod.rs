//! Image upload coordination.
//!
//! [`ImageUploader`] turns a local image into a backend-hosted URL:
//!
//! 1. reduce the image (first pass), and again with a stronger pass if it
//!    is still above the size ceiling;
//! 2. refuse to touch the network if both passes leave it oversized;
//! 3. post it as multipart under the primary field name, then the fallback
//!    field name, then as a hand-built body under a hard timer;
//! 4. pull the URL out of whatever shape the response has.

pub mod extract;
pub mod reducer;

use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};

use crate::backend::client::UploadEncoding;
use crate::backend::{ApiClient, ApiError, MultipartUpload};
use crate::constants::{
    DEFAULT_UPLOAD_MIME, DEFAULT_UPLOAD_NAME, FIRST_PASS_QUALITY, FIRST_PASS_WIDTH, MAX_UPLOAD_BYTES,
    SECOND_PASS_QUALITY, SECOND_PASS_WIDTH, UPLOAD_FALLBACK_FIELD, UPLOAD_PRIMARY_FIELD,
};

pub use extract::{extract_uploaded_url, find_uploaded_url, UrlCandidate, UPLOAD_URL_CANDIDATES};
pub use reducer::{ImageReducer, JpegReducer, ReducePass};

/// A local image picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    /// File path or `file://` URI
    pub uri: String,
    pub name: Option<String>,
    pub mime: Option<String>,
}

impl ImageSource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            mime: None,
        }
    }

    /// Filesystem path the URI points at.
    pub fn path(&self) -> PathBuf {
        if let Ok(url) = url::Url::parse(&self.uri) {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return path;
                }
            }
        }
        PathBuf::from(&self.uri)
    }

    /// Name sent with the multipart file part.
    pub fn file_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| {
                self.path()
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .filter(|name| !name.is_empty())
            })
            .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadSettings {
    pub max_bytes: u64,
    pub first_pass: ReducePass,
    pub second_pass: ReducePass,
    pub primary_field: String,
    pub fallback_field: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            first_pass: ReducePass::new(Some(FIRST_PASS_WIDTH), FIRST_PASS_QUALITY),
            second_pass: ReducePass::new(Some(SECOND_PASS_WIDTH), SECOND_PASS_QUALITY),
            primary_field: UPLOAD_PRIMARY_FIELD.to_string(),
            fallback_field: UPLOAD_FALLBACK_FIELD.to_string(),
        }
    }
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// URL exactly as the backend reported it
    pub resolved_url: String,
    pub size_bytes: u64,
    pub field_name: String,
    pub encoding: UploadEncoding,
}

pub struct ImageUploader {
    api: Arc<ApiClient>,
    reducer: Arc<dyn ImageReducer>,
    settings: UploadSettings,
}

impl ImageUploader {
    pub fn new(api: Arc<ApiClient>, reducer: Arc<dyn ImageReducer>, settings: UploadSettings) -> Self {
        Self { api, reducer, settings }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Reduce and upload an image.
    ///
    /// # Errors
    /// - [`ApiError::SessionExpired`] when no credential is held
    /// - [`ApiError::PayloadTooLarge`] when the reduced image is over the
    ///   ceiling (no request is sent) or the server answers 413
    /// - whatever the last upload attempt failed with otherwise
    pub async fn upload(&self, source: &ImageSource) -> Result<UploadResult, ApiError> {
        let session = self.api.session();
        session.ensure_initialized().await?;
        if session.token().await.is_none() {
            return Err(ApiError::SessionExpired);
        }

        let path = source.path();
        let original = tokio::fs::read(&path)
            .await
            .map_err(|e| ApiError::Image(format!("cannot read {}: {e}", path.display())))?;

        let bytes = self.prepare(original).await?;
        self.send_with_fallback(source, bytes).await
    }

    /// Run the reduction passes and enforce the size ceiling.
    pub async fn prepare(&self, original: Vec<u8>) -> Result<Vec<u8>, ApiError> {
        let reduced = self.run_pass(original, self.settings.first_pass).await?;
        if (reduced.len() as u64) <= self.settings.max_bytes {
            return Ok(reduced);
        }

        info!("🗜️ Image still {} bytes after first pass, reducing again", reduced.len());
        let reduced = self.run_pass(reduced, self.settings.second_pass).await?;
        let size = reduced.len() as u64;
        if size > self.settings.max_bytes {
            return Err(ApiError::PayloadTooLarge {
                message: format!(
                    "image is {:.2} MB after reduction, maximum is {:.2} MB",
                    megabytes(size),
                    megabytes(self.settings.max_bytes)
                ),
                status: None,
            });
        }
        Ok(reduced)
    }

    /// Apply one pass off the async runtime. A failing reducer leaves the
    /// input untouched.
    async fn run_pass(&self, bytes: Vec<u8>, pass: ReducePass) -> Result<Vec<u8>, ApiError> {
        let reducer = Arc::clone(&self.reducer);
        let (input, result) = tokio::task::spawn_blocking(move || {
            let result = reducer.reduce(&bytes, pass);
            (bytes, result)
        })
        .await
        .map_err(|e| ApiError::Image(format!("reduction task failed: {e}")))?;

        match result {
            Ok(reduced) => Ok(reduced),
            Err(err) => {
                warn!("⚠️ Image reduction failed, keeping previous bytes: {err}");
                Ok(input)
            }
        }
    }

    async fn send_with_fallback(&self, source: &ImageSource, bytes: Vec<u8>) -> Result<UploadResult, ApiError> {
        let primary = self.settings.primary_field.as_str();
        let fallback = self.settings.fallback_field.as_str();
        let user_id = self.api.session().user_id().await;

        let mut last_error = match self
            .attempt(source, &bytes, primary, UploadEncoding::Standard, user_id.as_deref())
            .await
        {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        for (field, encoding) in [(fallback, UploadEncoding::Standard), (primary, UploadEncoding::Raw)] {
            warn!("⚠️ Upload attempt failed ({last_error}); retrying with field '{field}' ({encoding:?})");
            match self.attempt(source, &bytes, field, encoding, user_id.as_deref()).await {
                Ok(result) => return Ok(result),
                Err(err) => last_error = err,
            }
        }

        warn!("❌ Image upload failed after all fallbacks: {last_error}");
        Err(last_error)
    }

    async fn attempt(
        &self,
        source: &ImageSource,
        bytes: &[u8],
        field: &str,
        encoding: UploadEncoding,
        user_id: Option<&str>,
    ) -> Result<UploadResult, ApiError> {
        let upload = MultipartUpload {
            field_name: field.to_string(),
            file_name: source.file_name(),
            mime: source.mime.clone().unwrap_or_else(|| DEFAULT_UPLOAD_MIME.to_string()),
            bytes: bytes.to_vec(),
            fields: user_id
                .map(|id| vec![("userId".to_string(), id.to_string())])
                .unwrap_or_default(),
        };

        let body = self.api.upload_image(upload, encoding).await?;
        let resolved_url = extract_uploaded_url(&body)?;
        info!("📤 Image uploaded via '{field}' ({encoding:?}): {resolved_url}");
        Ok(UploadResult {
            resolved_url,
            size_bytes: bytes.len() as u64,
            field_name: field.to_string(),
            encoding,
        })
    }
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
