//! Per-request upload files and the preview accessor.

use facegate_core::encoder::IMAGE_EXTENSIONS;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Extension used when the client filename has no recognized image extension.
const FALLBACK_EXTENSION: &str = "img";

/// One request's submitted file.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Filename declared by the client. Never used as a path component.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Extension kept from a client filename: a known image extension,
/// lowercased, or [`FALLBACK_EXTENSION`].
pub fn safe_extension(client_filename: &str) -> &'static str {
    Path::new(client_filename)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|e| IMAGE_EXTENSIONS.iter().find(|known| e.eq_ignore_ascii_case(known)))
        .copied()
        .unwrap_or(FALLBACK_EXTENSION)
}

/// Temporary copy of an upload, removed when dropped.
///
/// The name is a fresh UUID, so concurrent requests never share a file.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    removed: bool,
}

impl TempUpload {
    /// Write `upload` into `dir` under a server-generated name.
    pub async fn persist(dir: &Path, upload: &UploadedImage) -> std::io::Result<Self> {
        let name = format!("{}.{}", Uuid::new_v4(), safe_extension(&upload.filename));
        let guard = Self {
            path: dir.join(name),
            removed: false,
        };
        // The guard exists before the write, so a partial file is cleaned up too.
        tokio::fs::write(&guard.path, &upload.bytes).await?;
        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now, reporting failures other than "already gone".
    pub async fn remove(mut self) -> std::io::Result<()> {
        let result = tokio::fs::remove_file(&self.path).await;
        self.removed = true;
        match result {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove temporary upload"
                );
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("cannot read {0}: {1}")]
    Io(String, std::io::Error),
}

/// A file served back to the browser.
#[derive(Debug)]
pub struct Preview {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Content type for a preview, from the file extension; JPEG when unknown.
pub fn preview_content_type(filename: &str) -> &'static str {
    image::ImageFormat::from_path(filename)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/jpeg")
}

/// Read `filename` from `dir`.
///
/// Names that could escape `dir` are reported as not found.
pub async fn read_preview(dir: &Path, filename: &str) -> Result<Preview, PreviewError> {
    let escapes = filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0']);
    if escapes {
        return Err(PreviewError::NotFound(filename.to_string()));
    }

    let path = dir.join(filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(Preview {
            bytes,
            content_type: preview_content_type(filename),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PreviewError::NotFound(filename.to_string()))
        }
        // Directories and other non-files look missing to the client.
        Err(e) if path.is_dir() => {
            tracing::debug!(error = %e, "preview target is a directory");
            Err(PreviewError::NotFound(filename.to_string()))
        }
        Err(e) => Err(PreviewError::Io(filename.to_string(), e)),
    }
}
