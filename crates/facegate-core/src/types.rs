use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// Face encoding (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Cosine similarity in [-1, 1]. Higher = more similar.
    ///
    /// Always processes every dimension; zero vectors compare as 0.0.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let (dot, norm_a, norm_b) = self
            .values
            .iter()
            .zip(other.values.iter())
            .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (a, b)| {
                (dot + a * b, na + a * a, nb + b * b)
            });

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }
}

/// A reference face that grants access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedFace {
    /// Display label, taken from the reference image's file stem.
    pub label: String,
    /// Reference image the encoding was extracted from.
    pub source: PathBuf,
    pub embedding: Embedding,
}

/// Immutable set of authorized face encodings.
///
/// Built once at startup and shared by every request; cloning only bumps a
/// reference count.
#[derive(Debug, Clone, Default)]
pub struct AuthorizedSet {
    faces: Arc<[AuthorizedFace]>,
}

impl AuthorizedSet {
    pub fn new(faces: Vec<AuthorizedFace>) -> Self {
        Self {
            faces: faces.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn faces(&self) -> &[AuthorizedFace] {
        &self.faces
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.faces.iter().map(|f| f.label.as_str())
    }
}

/// Result of matching a probe embedding against the authorized set.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    /// Cosine similarity of the best candidate [-1, 1].
    pub similarity: f32,
    /// Label of the matched face (if any).
    pub label: Option<String>,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self {
            matched: false,
            similarity: 0.0,
            label: None,
        }
    }
}

/// Strategy for comparing a probe embedding against the authorized set.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, authorized: &AuthorizedSet, threshold: f32) -> MatchResult;
}

/// Cosine similarity matcher with constant-time traversal.
///
/// Always visits every authorized face so response timing does not leak the
/// set size or the position of the match.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn compare(
        &self,
        probe: &Embedding,
        authorized: &AuthorizedSet,
        threshold: f32,
    ) -> MatchResult {
        let best = authorized
            .faces()
            .iter()
            .map(|face| (probe.similarity(&face.embedding), face))
            .fold(None::<(f32, &AuthorizedFace)>, |best, (sim, face)| match best {
                Some((best_sim, _)) if best_sim >= sim => best,
                _ => Some((sim, face)),
            });

        match best {
            Some((sim, face)) if sim >= threshold => MatchResult {
                matched: true,
                similarity: sim,
                label: Some(face.label.clone()),
            },
            Some((sim, _)) => MatchResult {
                matched: false,
                similarity: sim,
                label: None,
            },
            None => MatchResult::no_match(),
        }
    }
}
