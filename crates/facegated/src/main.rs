use std::sync::Arc;

use anyhow::{Context, Result};
use facegated::config::Config;
use facegated::pipeline::VerificationPipeline;
use facegated::{build_router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "facegated starting");

    let config = Config::load()?;
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload directory {}", config.upload_dir.display()))?;

    let matcher = facegated::load_matcher(&config).await?;
    let authorized_faces = matcher.authorized().len();
    let speech = facegated::speech_adapter(&config)?;

    let pipeline = VerificationPipeline::new(
        Arc::new(matcher),
        speech,
        config.upload_dir.clone(),
        config.match_timeout(),
    );
    let app = build_router(AppState::new(pipeline, authorized_faces), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, authorized_faces, "facegated ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facegated shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
