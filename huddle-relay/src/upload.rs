//! HTTP file-upload collaborator.
//!
//! A REST endpoint living in the same process as the relay but never touching
//! relay state: it accepts one multipart file, stores it under the configured
//! directory, and returns the URL it can be fetched from. The directory
//! itself is served statically under `/files` by the router.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::relay::RelayState;

/// Settings for the upload collaborator.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory uploaded files are stored in and served from.
    pub dir: PathBuf,
    /// Absolute URL prefix for returned file URLs; relative URLs if unset.
    pub public_url: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            public_url: None,
        }
    }
}

/// Errors that can occur while handling an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The request contained no file field.
    #[error("no file field in upload request")]
    MissingFile,
    /// The multipart body could not be read.
    #[error("malformed multipart request: {0}")]
    Malformed(String),
    /// The file could not be written to disk.
    #[error("failed to store file: {0}")]
    Storage(String),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingFile | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Response body for a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// URL the stored file can be fetched from.
    pub url: String,
}

/// `POST /upload` — stores the first file field of a multipart request.
///
/// The stored name is a fresh UUID with the original extension, so uploads
/// never collide and client-supplied names never reach the filesystem.
///
/// # Errors
///
/// Returns [`UploadError`] if the body is malformed, carries no file, or the
/// file cannot be written.
pub async fn handle_upload(
    State(state): State<Arc<RelayState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Malformed(e.to_string()))?
    {
        let Some(original_name) = field.file_name().map(ToString::to_string) else {
            // Not a file field; keep looking.
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))?;
        let stored_name = stored_name(&original_name);

        let config = &state.upload;
        tokio::fs::create_dir_all(&config.dir)
            .await
            .map_err(|e| UploadError::Storage(e.to_string()))?;
        let path = config.dir.join(&stored_name);
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| UploadError::Storage(e.to_string()))?;

        tracing::info!(
            file = %stored_name,
            size = data.len(),
            "stored uploaded file"
        );

        let url = match &config.public_url {
            Some(base) => format!("{}/files/{stored_name}", base.trim_end_matches('/')),
            None => format!("/files/{stored_name}"),
        };
        return Ok((StatusCode::CREATED, Json(UploadResponse { url })));
    }

    Err(UploadError::MissingFile)
}

/// Builds the on-disk name for an upload: a UUIDv7 plus the original
/// extension, if the extension is plain ASCII alphanumeric.
fn stored_name(original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(OsStr::to_str)
        .filter(|e| !e.is_empty() && e.len() <= 16 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}{ext}", Uuid::now_v7())
}
