//! Best-effort local playback of synthesized speech.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Plays an audio file on the host. Never fails; problems are logged.
#[async_trait]
pub trait LocalPlayback: Send + Sync {
    async fn play(&self, audio_path: &Path);
}

/// Playback disabled (headless deployments).
pub struct NoPlayback;

#[async_trait]
impl LocalPlayback for NoPlayback {
    async fn play(&self, _audio_path: &Path) {}
}

/// Play encoded MP3 bytes through a temporary file, removed afterwards.
pub async fn play_audio(playback: &dyn LocalPlayback, audio: &[u8]) -> std::io::Result<()> {
    let file = tempfile::Builder::new()
        .prefix("facegate-play-")
        .suffix(".mp3")
        .tempfile()?;
    tokio::fs::write(file.path(), audio).await?;
    playback.play(file.path()).await;
    file.close()
}

/// Plays through the first available platform audio player.
pub struct SystemPlayer {
    players: Vec<String>,
    timeout: Duration,
}

/// Player fallback chain for the build target.
pub fn default_players() -> &'static [&'static str] {
    if cfg!(target_os = "macos") {
        &["afplay"]
    } else if cfg!(windows) {
        // The browser plays the returned audio.
        &[]
    } else {
        &["mpg321", "mpg123", "aplay"]
    }
}

impl SystemPlayer {
    pub fn new(timeout: Duration) -> Self {
        Self::with_players(default_players().iter().map(|p| p.to_string()).collect(), timeout)
    }

    pub fn with_players(players: Vec<String>, timeout: Duration) -> Self {
        Self { players, timeout }
    }
}

#[async_trait]
impl LocalPlayback for SystemPlayer {
    async fn play(&self, audio_path: &Path) {
        for player in &self.players {
            let spawned = Command::new(player)
                .arg(audio_path)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn();

            let mut child = match spawned {
                Ok(child) => child,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(player = %player, "audio player not installed; trying next");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(player = %player, error = %e, "audio player failed to start");
                    return;
                }
            };

            match tokio::time::timeout(self.timeout, child.wait()).await {
                Ok(Ok(status)) => tracing::debug!(player = %player, %status, "playback finished"),
                Ok(Err(e)) => tracing::debug!(player = %player, error = %e, "playback wait failed"),
                Err(_) => {
                    tracing::debug!(
                        player = %player,
                        timeout = ?self.timeout,
                        "playback timed out; killing player"
                    );
                    let _ = child.kill().await;
                }
            }
            return;
        }
        tracing::debug!("no audio player available; skipping local playback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_for_target() {
        let players = default_players();
        if cfg!(target_os = "linux") {
            assert_eq!(players, ["mpg321", "mpg123", "aplay"]);
        } else if cfg!(target_os = "macos") {
            assert_eq!(players, ["afplay"]);
        }
    }

    /// Remembers what it was asked to play and whether the file existed.
    #[derive(Default)]
    struct Recorder(std::sync::Mutex<Option<(std::path::PathBuf, Vec<u8>)>>);

    #[async_trait]
    impl LocalPlayback for Recorder {
        async fn play(&self, audio_path: &Path) {
            let bytes = std::fs::read(audio_path).unwrap_or_default();
            *self.0.lock().unwrap() = Some((audio_path.to_path_buf(), bytes));
        }
    }

    #[tokio::test]
    async fn test_play_audio_uses_unique_temp_file() {
        let recorder = Recorder::default();
        play_audio(&recorder, b"ID3 audio").await.unwrap();

        let (path, bytes) = recorder.0.lock().unwrap().take().unwrap();
        assert_eq!(bytes, b"ID3 audio");
        assert_eq!(path.extension().unwrap(), "mp3");
        assert!(!path.exists());

        play_audio(&recorder, b"again").await.unwrap();
        let (second, _) = recorder.0.lock().unwrap().take().unwrap();
        assert_ne!(path, second);
    }

    #[tokio::test]
    async fn test_missing_players_are_swallowed() {
        let player = SystemPlayer::with_players(
            vec!["facegate-missing-player-a".into(), "facegate-missing-player-b".into()],
            Duration::from_secs(1),
        );
        player.play(Path::new("/nonexistent/audio.mp3")).await;
    }

    // The player is `sh` reading the "audio" as a script; no file written by
    // a test is ever exec'd.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_falls_through_to_installed_player() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("played");
        let audio = dir.path().join("decision.mp3");
        std::fs::write(&audio, format!("echo \"$0\" > '{}'\n", marker.display())).unwrap();

        let player = SystemPlayer::with_players(
            vec!["facegate-missing-player".into(), "sh".into()],
            Duration::from_secs(5),
        );
        player.play(&audio).await;

        let played = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(played.trim(), audio.to_string_lossy());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_player_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("decision.mp3");
        std::fs::write(&audio, "sleep 30\n").unwrap();

        let player = SystemPlayer::with_players(vec!["sh".into()], Duration::from_millis(100));
        let started = std::time::Instant::now();
        player.play(&audio).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
