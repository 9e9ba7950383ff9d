use facegate_core::{EncodeError, FaceEncoder, FaceEncoding};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Synchronous photo encoder owned by the engine thread.
pub trait PhotoEncoder {
    fn encode_file(
        &mut self,
        path: &Path,
        max_faces: usize,
    ) -> Result<Vec<FaceEncoding>, EncodeError>;
}

impl PhotoEncoder for FaceEncoder {
    fn encode_file(
        &mut self,
        path: &Path,
        max_faces: usize,
    ) -> Result<Vec<FaceEncoding>, EncodeError> {
        FaceEncoder::encode_file(self, path, max_faces)
    }
}

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    EncodeFile {
        path: PathBuf,
        max_faces: usize,
        reply: oneshot::Sender<Result<Vec<FaceEncoding>, EncodeError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Decode the photo at `path` and encode up to `max_faces` faces.
    pub async fn encode_file(
        &self,
        path: &Path,
        max_faces: usize,
    ) -> Result<Vec<FaceEncoding>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::EncodeFile {
                path: path.to_path_buf(),
                max_faces,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// ONNX inference is CPU-bound and needs `&mut` access to the sessions, so
/// one thread owns the encoder and serves requests in arrival order. The
/// thread exits once every handle is dropped.
pub fn spawn_engine<E>(mut encoder: E) -> Result<EngineHandle, EngineError>
where
    E: PhotoEncoder + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(8);

    std::thread::Builder::new()
        .name("facegate-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::EncodeFile {
                        path,
                        max_faces,
                        reply,
                    } => {
                        let result = encoder.encode_file(&path, max_faces);
                        if let Err(e) = &result {
                            tracing::debug!(
                                path = %path.display(),
                                error = %e,
                                "engine: encode failed"
                            );
                        }
                        // Receiver may have timed out and gone away.
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}


#[cfg(test)]
mod tests {
    use super::testing::TextEncoder;
    use super::*;

    #[tokio::test]
    async fn test_engine_encodes_on_worker_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two_faces.txt");
        std::fs::write(&path, "1 0 0\n0 1 0\n").unwrap();

        let engine = spawn_engine(TextEncoder).unwrap();
        let faces = engine.encode_file(&path, 5).await.unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[1].embedding.values, vec![0.0, 1.0, 0.0]);

        let limited = engine.encode_file(&path, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_engine_propagates_encode_errors() {
        let engine = spawn_engine(TextEncoder).unwrap();
        let err = engine
            .encode_file(Path::new("/nonexistent/facegate/photo.jpg"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Encode(EncodeError::Io(_))));
    }
}
