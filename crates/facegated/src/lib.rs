//! facegated: photo verification service.
//!
//! Uploads are matched against the authorized face set by the ONNX engine
//! thread, and the decision is spoken through a TTS service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod authorized;
pub mod config;
pub mod engine;
pub mod matcher;
pub mod pipeline;
pub mod playback;
pub mod speech;
pub mod upload;

use config::Config;
use matcher::EngineMatcher;
use pipeline::VerificationPipeline;
use playback::{LocalPlayback, NoPlayback, SystemPlayer};
use speech::{GoogleTts, SpeechAdapter};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<VerificationPipeline>,
    /// Size of the authorized set, reported by /health.
    pub authorized_faces: usize,
}

impl AppState {
    pub fn new(pipeline: VerificationPipeline, authorized_faces: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            authorized_faces,
        }
    }
}

/// Build the HTTP router.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(api::serve_index))
        .route("/verify", post(api::verify))
        .route("/preview/:filename", get(api::preview))
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the models, start the engine thread and enroll the authorized set.
pub async fn load_matcher(config: &Config) -> anyhow::Result<EngineMatcher> {
    let encoder = facegate_core::FaceEncoder::load(&config.model_dir)
        .with_context(|| format!("loading face models from {}", config.model_dir.display()))?;
    let engine = engine::spawn_engine(encoder)?;

    let authorized = authorized::load_authorized_set(&engine, &config.authorized_dir)
        .await
        .context("enrolling authorized faces")?;
    tracing::info!(
        count = authorized.len(),
        labels = ?authorized.labels().collect::<Vec<_>>(),
        dir = %config.authorized_dir.display(),
        "authorized faces loaded"
    );

    Ok(EngineMatcher::new(
        engine,
        authorized,
        config.similarity_threshold,
        config.max_faces,
    ))
}

/// Speech adapter for the configured TTS endpoint and playback setting.
pub fn speech_adapter(config: &Config) -> anyhow::Result<SpeechAdapter> {
    let client = reqwest::Client::builder()
        .timeout(config.speech_timeout())
        .build()
        .context("building HTTP client")?;
    let tts = GoogleTts::new(client, config.tts_endpoint.clone(), config.tts_language.clone());
    Ok(SpeechAdapter::new(
        Arc::new(tts),
        local_playback(config.playback_enabled, config.playback_timeout()),
        config.speech_timeout(),
    ))
}

fn local_playback(enabled: bool, timeout: Duration) -> Arc<dyn LocalPlayback> {
    if enabled {
        Arc::new(SystemPlayer::new(timeout))
    } else {
        Arc::new(NoPlayback)
    }
}
