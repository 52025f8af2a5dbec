//! Staging of uploaded videos on local disk.
//!
//! The `video` multipart field is streamed chunk by chunk to
//! `<upload_dir>/<uuid>.<ext>` so large files never sit in memory.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::Multipart;
use lifeguard_pipeline::pipeline::remove_upload;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

const FALLBACK_EXTENSION: &str = "mp4";
const MAX_EXTENSION_LEN: usize = 8;

/// A video written to the upload directory.
#[derive(Debug)]
pub struct StagedUpload {
    pub path: PathBuf,
    /// Name the client gave the file.
    pub filename: String,
    pub size_bytes: u64,
}

/// Find the `video` field in `multipart` and write it to `upload_dir`.
///
/// A part named `video` without a filename is a plain form value and is
/// skipped, as is every other field.
pub async fn stage_video(multipart: &mut Multipart, upload_dir: &Path) -> AppResult<StagedUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if filename.is_empty() {
            return Err(AppError::BadRequest("No video file selected".into()));
        }

        let path = upload_dir.join(format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            upload_extension(&filename)
        ));
        let size_bytes = match write_field(field, &path).await {
            Ok(size) => size,
            Err(e) => {
                remove_upload(&path).await;
                return Err(e);
            }
        };
        if size_bytes == 0 {
            remove_upload(&path).await;
            return Err(AppError::BadRequest("Uploaded video file is empty".into()));
        }

        tracing::debug!(%filename, size_bytes, path = %path.display(), "Upload staged");
        return Ok(StagedUpload {
            path,
            filename,
            size_bytes,
        });
    }

    Err(AppError::BadRequest("No video file provided".into()))
}

async fn write_field(mut field: Field<'_>, path: &Path) -> AppResult<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create upload file: {e}")))?;

    let mut written: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to write upload: {e}")))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to write upload: {e}")))?;

    Ok(written)
}

/// Extension for the staged file: the client's when it is short and
/// alphanumeric, otherwise `mp4`.
pub fn upload_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}
