//! Speech synthesis capability and the best-effort adapter the pipeline uses.

use crate::playback::LocalPlayback;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Longest text the translate TTS endpoint accepts per request.
const TTS_MAX_CHUNK_CHARS: usize = 100;

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("nothing to say")]
    EmptyText,
    #[error("TTS request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("TTS service returned no audio")]
    EmptyAudio,
    #[error("audio file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("speech synthesis timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}

/// Turns text into encoded audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError>;
}

/// Google Translate TTS endpoint, returning MP3 audio.
pub struct GoogleTts {
    client: reqwest::Client,
    endpoint: String,
    language: String,
}

impl GoogleTts {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            language: language.into(),
        }
    }

    fn chunk_query(&self, chunk: &str, idx: usize, total: usize) -> Vec<(&'static str, String)> {
        vec![
            ("ie", "UTF-8".to_string()),
            ("q", chunk.to_string()),
            ("tl", self.language.clone()),
            ("client", "tw-ob".to_string()),
            ("total", total.to_string()),
            ("idx", idx.to_string()),
            ("textlen", chunk.chars().count().to_string()),
        ]
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let chunks = chunk_text(text, TTS_MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let bytes = self
                .client
                .get(&self.endpoint)
                .query(&self.chunk_query(chunk, idx, chunks.len()))
                .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            tracing::debug!(idx, total = chunks.len(), bytes = bytes.len(), "TTS chunk received");
            audio.extend_from_slice(&bytes);
        }

        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        Ok(audio)
    }
}

/// Split `text` into pieces of at most `max_chars` characters, breaking on
/// whitespace where possible.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        // Words longer than a chunk are cut at character boundaries.
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let split = word.char_indices().nth(max_chars).map(|(i, _)| i).unwrap_or(word.len());
            chunks.push(word[..split].to_string());
            word = &word[split..];
        }
        if word.is_empty() {
            continue;
        }

        let separator = usize::from(!current.is_empty());
        let needed = separator + word.chars().count();
        if current.chars().count() + needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Best-effort speech for the verification pipeline.
///
/// Synthesizes, plays locally, and returns the audio base64-encoded. Any
/// failure is logged and yields `None`.
pub struct SpeechAdapter {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    playback: Arc<dyn LocalPlayback>,
    timeout: Duration,
}

impl SpeechAdapter {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        playback: Arc<dyn LocalPlayback>,
        timeout: Duration,
    ) -> Self {
        Self {
            synthesizer,
            playback,
            timeout,
        }
    }

    /// Speak `text`, returning base64 audio or `None` on any failure.
    pub async fn speak(&self, text: &str) -> Option<String> {
        let result = match tokio::time::timeout(self.timeout, self.render(text)).await {
            Ok(result) => result,
            Err(_) => Err(SpeechError::Timeout(self.timeout)),
        };

        match result {
            Ok(audio) => Some(audio),
            Err(e) => {
                tracing::warn!(
                    text,
                    error = %e,
                    "speech synthesis failed; responding without audio"
                );
                None
            }
        }
    }

    async fn render(&self, text: &str) -> Result<String, SpeechError> {
        let audio = self.synthesizer.synthesize(text).await?;
        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }

        // Deleted on drop, including when the timeout cancels this future.
        let file = tempfile::Builder::new()
            .prefix("facegate-speech-")
            .suffix(".mp3")
            .tempfile()?;
        tokio::fs::write(file.path(), &audio).await?;

        self.playback.play(file.path()).await;

        let data = tokio::fs::read(file.path()).await?;
        file.close()?;
        Ok(BASE64.encode(data))
    }
}
