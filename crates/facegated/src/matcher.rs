//! Face matching capability.

use crate::engine::{EngineError, EngineHandle};
use async_trait::async_trait;
use facegate_core::{AuthorizedSet, CosineMatcher, MatchResult, Matcher};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0}")]
    Other(String),
}

/// Outcome of checking one photo against the authorized set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub is_authorized: bool,
    pub message: String,
}

/// Decides whether the photo at a path shows an authorized face.
#[async_trait]
pub trait FaceMatcher: Send + Sync {
    async fn verify_face(&self, image_path: &Path) -> Result<VerificationResult, MatchError>;
}

/// Matcher backed by the ONNX engine thread and an injected authorized set.
pub struct EngineMatcher {
    engine: EngineHandle,
    authorized: AuthorizedSet,
    threshold: f32,
    max_faces: usize,
}

impl EngineMatcher {
    pub fn new(
        engine: EngineHandle,
        authorized: AuthorizedSet,
        threshold: f32,
        max_faces: usize,
    ) -> Self {
        Self {
            engine,
            authorized,
            threshold,
            max_faces: max_faces.max(1),
        }
    }

    pub fn authorized(&self) -> &AuthorizedSet {
        &self.authorized
    }
}

#[async_trait]
impl FaceMatcher for EngineMatcher {
    async fn verify_face(&self, image_path: &Path) -> Result<VerificationResult, MatchError> {
        let encodings = self.engine.encode_file(image_path, self.max_faces).await?;

        if encodings.is_empty() {
            return Ok(VerificationResult {
                is_authorized: false,
                message: "No face detected in the uploaded image".to_string(),
            });
        }

        if self.authorized.is_empty() {
            return Ok(VerificationResult {
                is_authorized: false,
                message: "No authorized faces are enrolled".to_string(),
            });
        }

        // Best candidate across every face in the photo.
        let best = encodings
            .iter()
            .map(|enc| CosineMatcher.compare(&enc.embedding, &self.authorized, self.threshold))
            .fold(None::<MatchResult>, |best, r| match best {
                Some(b) if b.similarity >= r.similarity => Some(b),
                _ => Some(r),
            })
            .unwrap_or_else(MatchResult::no_match);

        tracing::debug!(
            faces = encodings.len(),
            matched = best.matched,
            similarity = best.similarity,
            "match complete"
        );

        Ok(describe(&best))
    }
}

fn describe(result: &MatchResult) -> VerificationResult {
    match (&result.label, result.matched) {
        (Some(label), true) => VerificationResult {
            is_authorized: true,
            message: format!("Face recognized as {label} (similarity {:.2})", result.similarity),
        },
        _ => VerificationResult {
            is_authorized: false,
            message: format!("Face not recognized (best similarity {:.2})", result.similarity),
        },
    }
}
