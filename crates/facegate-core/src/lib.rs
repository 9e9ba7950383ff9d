//! facegate-core: face detection and recognition engine.
//!
//! Uses SCRFD for face detection and ArcFace for face encodings, both
//! running via ONNX Runtime for CPU inference.

use std::path::PathBuf;

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod recognizer;
pub mod types;

pub use encoder::{is_image_path, load_image, EncodeError, FaceEncoder, FaceEncoding};
pub use types::{
    AuthorizedFace, AuthorizedSet, BoundingBox, CosineMatcher, Embedding, MatchResult, Matcher,
};

/// Default ONNX model directory: `$XDG_DATA_HOME/facegate/models`, falling
/// back to `~/.local/share/facegate/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
        .join("models")
}
