//! Photo → face encodings, combining the detector and the recognizer.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, Embedding};
use image::{ImageReader, RgbImage};
use std::path::Path;
use thiserror::Error;

/// SCRFD detection model file name inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// File extensions treated as photos.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "webp", "gif"];

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("cannot read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// One face found in a photo.
#[derive(Debug, Clone)]
pub struct FaceEncoding {
    pub face: BoundingBox,
    pub embedding: Embedding,
}

/// Whether `path` carries one of [`IMAGE_EXTENSIONS`] (case-insensitive).
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|known| e.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// Decode a photo to RGB, sniffing the format from its content rather than
/// trusting the extension.
pub fn load_image(path: &Path) -> Result<RgbImage, EncodeError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image.to_rgb8())
}

/// Face detector and recognizer loaded together.
pub struct FaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl FaceEncoder {
    /// Load both ONNX models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, EncodeError> {
        let detector = FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE))?;
        Ok(Self {
            detector,
            recognizer,
        })
    }

    /// Encode up to `max_faces` faces, most confident first.
    ///
    /// A photo without any detectable face yields an empty vector.
    pub fn encode(
        &mut self,
        image: &RgbImage,
        max_faces: usize,
    ) -> Result<Vec<FaceEncoding>, EncodeError> {
        let faces = self.detector.detect(image)?;
        tracing::debug!(detected = faces.len(), max_faces, "encode: faces detected");

        faces
            .into_iter()
            .filter(|f| f.landmarks.is_some())
            .take(max_faces)
            .map(|face| -> Result<FaceEncoding, EncodeError> {
                let embedding = self.recognizer.extract(image, &face)?;
                Ok(FaceEncoding { face, embedding })
            })
            .collect()
    }

    /// Decode and encode the photo at `path`.
    pub fn encode_file(
        &mut self,
        path: &Path,
        max_faces: usize,
    ) -> Result<Vec<FaceEncoding>, EncodeError> {
        let image = load_image(path)?;
        tracing::debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "encode: image decoded"
        );
        self.encode(&image, max_faces)
    }
}
