use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Service configuration.
///
/// Defaults, optionally overlaid by the TOML file named in `FACEGATE_CONFIG`,
/// then by `FACEGATE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address (default: 0.0.0.0:8000).
    pub bind_addr: String,
    /// Directory for per-request temporary uploads; created at startup.
    pub upload_dir: PathBuf,
    /// Directory of reference photos that grant access.
    pub authorized_dir: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Cosine similarity floor for a positive match.
    pub similarity_threshold: f32,
    /// Faces encoded per uploaded photo, most confident first.
    pub max_faces: usize,
    /// Timeout in seconds for face matching.
    pub match_timeout_secs: u64,
    /// Timeout in seconds for speech synthesis, playback included.
    pub speech_timeout_secs: u64,
    /// Whether to play the decision phrase on the host's speakers.
    pub playback_enabled: bool,
    /// Timeout in seconds for one playback subprocess.
    pub playback_timeout_secs: u64,
    /// Language code passed to the TTS service.
    pub tts_language: String,
    /// TTS endpoint URL.
    pub tts_endpoint: String,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            upload_dir: PathBuf::from("uploads"),
            authorized_dir: PathBuf::from("authorized_faces"),
            model_dir: facegate_core::default_model_dir(),
            similarity_threshold: 0.40,
            max_faces: 5,
            match_timeout_secs: 30,
            speech_timeout_secs: 10,
            playback_enabled: true,
            playback_timeout_secs: 5,
            tts_language: "en".to_string(),
            tts_endpoint: "https://translate.google.com/translate_tts".to_string(),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration: file named by `FACEGATE_CONFIG` (if set), then
    /// `FACEGATE_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var_os("FACEGATE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    /// Parse a TOML file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `FACEGATE_*` overrides from `lookup`. Unparseable values keep the
    /// current setting.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("FACEGATE_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("FACEGATE_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEGATE_AUTHORIZED_DIR") {
            self.authorized_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEGATE_MODEL_DIR") {
            self.model_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("FACEGATE_TTS_LANGUAGE") {
            self.tts_language = v;
        }
        if let Some(v) = lookup("FACEGATE_TTS_ENDPOINT") {
            self.tts_endpoint = v;
        }
        if let Some(v) = lookup("FACEGATE_PLAYBACK_ENABLED") {
            self.playback_enabled = v != "0";
        }

        self.similarity_threshold =
            parsed(lookup("FACEGATE_SIMILARITY_THRESHOLD"), self.similarity_threshold);
        self.max_faces = parsed(lookup("FACEGATE_MAX_FACES"), self.max_faces);
        self.match_timeout_secs =
            parsed(lookup("FACEGATE_MATCH_TIMEOUT_SECS"), self.match_timeout_secs);
        self.speech_timeout_secs =
            parsed(lookup("FACEGATE_SPEECH_TIMEOUT_SECS"), self.speech_timeout_secs);
        self.playback_timeout_secs =
            parsed(lookup("FACEGATE_PLAYBACK_TIMEOUT_SECS"), self.playback_timeout_secs);
        self.max_upload_bytes = parsed(lookup("FACEGATE_MAX_UPLOAD_BYTES"), self.max_upload_bytes);
        self
    }

    pub fn match_timeout(&self) -> Duration {
        Duration::from_secs(self.match_timeout_secs)
    }

    pub fn speech_timeout(&self) -> Duration {
        Duration::from_secs(self.speech_timeout_secs)
    }

    pub fn playback_timeout(&self) -> Duration {
        Duration::from_secs(self.playback_timeout_secs)
    }
}

fn parsed<T: std::str::FromStr>(value: Option<String>, current: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(current)
}
