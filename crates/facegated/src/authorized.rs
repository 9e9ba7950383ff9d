//! Startup enrollment of the authorized face set from reference photos.

use crate::engine::{EngineError, EngineHandle};
use facegate_core::{is_image_path, AuthorizedFace, AuthorizedSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("reading authorized faces directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Build the authorized set from every photo in `dir`.
///
/// Each photo contributes its most confident face, labelled with the file
/// stem. Photos without a face or that fail to decode are skipped; a missing
/// directory yields an empty set.
pub async fn load_authorized_set(
    engine: &EngineHandle,
    dir: &Path,
) -> Result<AuthorizedSet, EnrollError> {
    if !dir.is_dir() {
        tracing::warn!(
            dir = %dir.display(),
            "authorized faces directory not found; nobody will be granted access"
        );
        return Ok(AuthorizedSet::default());
    }

    let read_err = |source| EnrollError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut photos = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let path = entry.path();
        if path.is_file() && is_image_path(&path) {
            photos.push(path);
        }
    }
    photos.sort();

    let mut faces = Vec::with_capacity(photos.len());
    for path in photos {
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match engine.encode_file(&path, 1).await {
            Ok(mut encodings) if !encodings.is_empty() => {
                let best = encodings.swap_remove(0);
                tracing::info!(
                    label = %label,
                    confidence = best.face.confidence,
                    "authorized face enrolled"
                );
                faces.push(AuthorizedFace {
                    label,
                    source: path,
                    embedding: best.embedding,
                });
            }
            Ok(_) => {
                tracing::warn!(
                    path = %path.display(),
                    "no face found in reference photo; skipping"
                );
            }
            Err(EngineError::Encode(e)) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "cannot encode reference photo; skipping"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(count = faces.len(), dir = %dir.display(), "authorized face set loaded");
    Ok(AuthorizedSet::new(faces))
}
