use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facegated::config::Config;
use facegated::matcher::FaceMatcher;
use facegated::pipeline::decision_phrase;
use facegated::playback::{play_audio, SystemPlayer};
use facegated::speech::{GoogleTts, SpeechSynthesizer};

#[derive(Parser)]
#[command(name = "facegate", about = "facegate photo verification CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a photo against the authorized faces
    Verify {
        /// Path to the photo
        image: PathBuf,
    },
    /// List enrolled authorized faces
    List,
    /// Synthesize a phrase with the configured TTS service
    Say {
        /// Text to speak
        text: String,
        /// Also save the MP3 here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Verify { image } => {
            if !image.is_file() {
                bail!("no such file: {}", image.display());
            }
            let matcher = facegated::load_matcher(&config).await?;
            let result = tokio::time::timeout(config.match_timeout(), matcher.verify_face(&image))
                .await
                .context("face matching timed out")??;

            tracing::info!(
                decision = decision_phrase(result.is_authorized),
                "verification finished"
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::List => {
            let matcher = facegated::load_matcher(&config).await?;
            let authorized = matcher.authorized();
            if authorized.is_empty() {
                println!("No authorized faces in {}", config.authorized_dir.display());
            }
            for face in authorized.faces() {
                println!("{:<24} {}", face.label, face.source.display());
            }
        }
        Commands::Say { text, out } => {
            let client = reqwest::Client::builder()
                .timeout(config.speech_timeout())
                .build()?;
            let tts = GoogleTts::new(
                client,
                config.tts_endpoint.clone(),
                config.tts_language.clone(),
            );
            let audio = tts.synthesize(&text).await?;

            if let Some(path) = &out {
                std::fs::write(path, &audio)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Wrote {} bytes to {}", audio.len(), path.display());
            }

            play_audio(&SystemPlayer::new(config.playback_timeout()), &audio)
                .await
                .context("staging audio for playback")?;
        }
    }

    Ok(())
}
