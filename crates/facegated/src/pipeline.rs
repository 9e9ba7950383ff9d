//! Verification request pipeline: persist → match → speak → clean up.

use crate::matcher::{FaceMatcher, MatchError};
use crate::speech::SpeechAdapter;
use crate::upload::{TempUpload, UploadedImage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const ACCESS_GRANTED: &str = "Access Granted";
pub const ACCESS_DENIED: &str = "Access Denied";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No file uploaded")]
    NoFile,
    #[error("No file selected")]
    EmptyFilename,
    #[error("failed to store upload: {0}")]
    Store(#[source] std::io::Error),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("face matching timed out after {0:?}")]
    MatchTimeout(Duration),
}

impl PipelineError {
    /// Whether the caller sent a bad request (as opposed to a server fault).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NoFile | Self::EmptyFilename)
    }
}

/// Successful verification payload.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub is_authorized: bool,
    pub message: String,
    /// Base64 MP3 of the decision phrase; `null` when speech failed.
    pub audio: Option<String>,
}

/// Decision phrase announced for a verification outcome.
pub fn decision_phrase(is_authorized: bool) -> &'static str {
    if is_authorized {
        ACCESS_GRANTED
    } else {
        ACCESS_DENIED
    }
}

pub struct VerificationPipeline {
    matcher: Arc<dyn FaceMatcher>,
    speech: SpeechAdapter,
    upload_dir: PathBuf,
    match_timeout: Duration,
}

impl VerificationPipeline {
    pub fn new(
        matcher: Arc<dyn FaceMatcher>,
        speech: SpeechAdapter,
        upload_dir: impl Into<PathBuf>,
        match_timeout: Duration,
    ) -> Self {
        Self {
            matcher,
            speech,
            upload_dir: upload_dir.into(),
            match_timeout,
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Verify one upload.
    ///
    /// Missing files and empty filenames are rejected before anything is
    /// written. Once persisted, the temporary file is removed on every exit
    /// path before this returns.
    pub async fn verify(
        &self,
        upload: Option<UploadedImage>,
    ) -> Result<VerifyResponse, PipelineError> {
        let upload = upload.ok_or(PipelineError::NoFile)?;
        if upload.filename.trim().is_empty() {
            return Err(PipelineError::EmptyFilename);
        }

        let temp = TempUpload::persist(&self.upload_dir, &upload)
            .await
            .map_err(PipelineError::Store)?;
        tracing::debug!(
            client_filename = %upload.filename,
            path = %temp.path().display(),
            bytes = upload.bytes.len(),
            "upload stored"
        );

        let matching = self.matcher.verify_face(temp.path());
        let verification = tokio::time::timeout(self.match_timeout, matching)
            .await
            .map_err(|_| PipelineError::MatchTimeout(self.match_timeout))??;

        let phrase = decision_phrase(verification.is_authorized);
        tracing::info!(
            authorized = verification.is_authorized,
            message = %verification.message,
            "verification decided"
        );

        let audio = self.speech.speak(phrase).await;

        if let Err(e) = temp.remove().await {
            tracing::warn!(error = %e, "failed to remove temporary upload");
        }

        Ok(VerifyResponse {
            success: true,
            is_authorized: verification.is_authorized,
            message: verification.message,
            audio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::VerificationResult;
    use crate::playback::NoPlayback;
    use crate::speech::{SpeechError, SpeechSynthesizer};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Authorizes photos whose bytes are exactly `b"alice"`; `b"boom"` fails.
    /// Records the path and contents it saw.
    #[derive(Default)]
    struct BytesMatcher {
        seen: Mutex<Vec<(PathBuf, Vec<u8>)>>,
    }

    #[async_trait]
    impl FaceMatcher for BytesMatcher {
        async fn verify_face(&self, image_path: &Path) -> Result<VerificationResult, MatchError> {
            let bytes = tokio::fs::read(image_path)
                .await
                .map_err(|e| MatchError::Other(e.to_string()))?;
            self.seen.lock().unwrap().push((image_path.to_path_buf(), bytes.clone()));
            match bytes.as_slice() {
                b"boom" => Err(MatchError::Other("unsupported image format".into())),
                b"alice" => Ok(VerificationResult { is_authorized: true, message: "alice".into() }),
                _ => Ok(VerificationResult { is_authorized: false, message: "stranger".into() }),
            }
        }
    }

    struct HangingMatcher;

    #[async_trait]
    impl FaceMatcher for HangingMatcher {
        async fn verify_face(&self, _image_path: &Path) -> Result<VerificationResult, MatchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(VerificationResult { is_authorized: true, message: "late".into() })
        }
    }

    /// Echoes the phrase back as audio and records it.
    #[derive(Default)]
    struct EchoSynth {
        phrases: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl SpeechSynthesizer for EchoSynth {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
            self.phrases.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(SpeechError::Other("tts offline".into()));
            }
            Ok(text.as_bytes().to_vec())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        matcher: Arc<BytesMatcher>,
        synth: Arc<EchoSynth>,
        pipeline: VerificationPipeline,
    }

    fn fixture(fail_speech: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let matcher = Arc::new(BytesMatcher::default());
        let synth = Arc::new(EchoSynth { fail: fail_speech, ..Default::default() });
        let speech =
            SpeechAdapter::new(synth.clone(), Arc::new(NoPlayback), Duration::from_secs(5));
        let pipeline =
            VerificationPipeline::new(matcher.clone(), speech, dir.path(), Duration::from_secs(5));
        Fixture { dir, matcher, synth, pipeline }
    }

    fn upload(name: &str, bytes: &[u8]) -> Option<UploadedImage> {
        Some(UploadedImage { filename: name.into(), bytes: bytes.to_vec() })
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_authorized_face_grants_access() {
        let f = fixture(false);
        let resp = f.pipeline.verify(upload("alice.jpg", b"alice")).await.unwrap();

        assert!(resp.success);
        assert!(resp.is_authorized);
        assert_eq!(resp.message, "alice");
        assert_eq!(*f.synth.phrases.lock().unwrap(), vec![ACCESS_GRANTED]);
        assert!(resp.audio.is_some());
        assert!(dir_is_empty(f.dir.path()));
    }

    #[tokio::test]
    async fn test_unknown_face_denies_access() {
        let f = fixture(false);
        let resp = f.pipeline.verify(upload("who.png", b"mallory")).await.unwrap();

        assert!(!resp.is_authorized);
        assert_eq!(*f.synth.phrases.lock().unwrap(), vec![ACCESS_DENIED]);
        assert!(dir_is_empty(f.dir.path()));
    }

    #[tokio::test]
    async fn test_exactly_one_artifact_per_upload() {
        let f = fixture(false);
        f.pipeline.verify(upload("alice.jpg", b"alice")).await.unwrap();

        let seen = f.matcher.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (path, bytes) = &seen[0];
        assert_eq!(path.parent(), Some(f.dir.path()));
        assert_eq!(bytes, b"alice");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_missing_file_writes_nothing() {
        let f = fixture(false);
        let err = f.pipeline.verify(None).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoFile));
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "No file uploaded");
        assert!(f.matcher.seen.lock().unwrap().is_empty());
        assert!(dir_is_empty(f.dir.path()));
    }

    #[tokio::test]
    async fn test_empty_filename_writes_nothing() {
        let f = fixture(false);
        let err = f.pipeline.verify(upload("", b"alice")).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyFilename));
        assert_eq!(err.to_string(), "No file selected");
        assert!(f.synth.phrases.lock().unwrap().is_empty());
        assert!(dir_is_empty(f.dir.path()));
    }

    #[tokio::test]
    async fn test_matcher_failure_still_cleans_up() {
        let f = fixture(false);
        let err = f.pipeline.verify(upload("bad.jpg", b"boom")).await.unwrap_err();

        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "unsupported image format");
        assert!(f.synth.phrases.lock().unwrap().is_empty());
        assert!(dir_is_empty(f.dir.path()));
    }

    #[tokio::test]
    async fn test_matcher_timeout_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let speech = SpeechAdapter::new(
            Arc::new(EchoSynth::default()),
            Arc::new(NoPlayback),
            Duration::from_secs(1),
        );
        let pipeline = VerificationPipeline::new(
            Arc::new(HangingMatcher),
            speech,
            dir.path(),
            Duration::from_millis(50),
        );

        let err = pipeline.verify(upload("slow.jpg", b"alice")).await.unwrap_err();
        assert!(matches!(err, PipelineError::MatchTimeout(_)));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_speech_failure_degrades_to_no_audio() {
        let f = fixture(true);
        let resp = f.pipeline.verify(upload("alice.jpg", b"alice")).await.unwrap();

        assert!(resp.success);
        assert!(resp.is_authorized);
        assert!(resp.audio.is_none());
        assert!(dir_is_empty(f.dir.path()));
    }

    #[tokio::test]
    async fn test_store_failure_is_server_error() {
        let f = fixture(false);
        let pipeline = VerificationPipeline::new(
            f.matcher.clone(),
            SpeechAdapter::new(f.synth.clone(), Arc::new(NoPlayback), Duration::from_secs(1)),
            f.dir.path().join("missing"),
            Duration::from_secs(1),
        );
        let err = pipeline.verify(upload("alice.jpg", b"alice")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Store(_)));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_concurrent_uploads_stay_separate() {
        let f = Arc::new(fixture(false));
        let mut tasks = Vec::new();
        for i in 0..16 {
            let f = f.clone();
            tasks.push(tokio::spawn(async move {
                let body = if i % 2 == 0 {
                    b"alice".to_vec()
                } else {
                    format!("guest-{i}").into_bytes()
                };
                let resp = f.pipeline.verify(upload("same-name.jpg", &body)).await.unwrap();
                (i, resp)
            }));
        }

        for task in tasks {
            let (i, resp) = task.await.unwrap();
            assert_eq!(resp.is_authorized, i % 2 == 0, "request {i}");
        }

        let seen = f.matcher.seen.lock().unwrap();
        assert_eq!(seen.len(), 16);
        let mut paths: Vec<_> = seen.iter().map(|(p, _)| p.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 16);
        assert!(dir_is_empty(f.dir.path()));
    }

    #[test]
    fn test_decision_phrase() {
        assert_eq!(decision_phrase(true), "Access Granted");
        assert_eq!(decision_phrase(false), "Access Denied");
    }

    #[test]
    fn test_response_serializes_null_audio() {
        let resp = VerifyResponse {
            success: true,
            is_authorized: false,
            message: "Face not recognized".into(),
            audio: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["is_authorized"], false);
        assert!(json["audio"].is_null());
    }
}
