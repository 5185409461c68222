use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::backend::{CaptureBackend, CaptureError, CaptureSink};
use super::profile::EncoderProfile;

/// Owns at most one live capture sink and enforces open/close discipline.
///
/// All methods are called under the session manager's lock, so no two
/// operations against the sink ever run concurrently.
pub struct CaptureRecorder {
    backend: Arc<dyn CaptureBackend>,
    profile: EncoderProfile,
    sink: Option<Box<dyn CaptureSink>>,
}

impl CaptureRecorder {
    pub fn new(backend: Arc<dyn CaptureBackend>, profile: EncoderProfile) -> Self {
        Self {
            backend,
            profile,
            sink: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Configure the fixed profile and start capturing into `path`.
    ///
    /// Fails if a sink is already open. On backend failure nothing is
    /// retained: the backend contract guarantees the partial handle was
    /// released before the error surfaced.
    pub async fn open(&mut self, path: &Path) -> Result<(), CaptureError> {
        if self.sink.is_some() {
            return Err(CaptureError::Configuration(
                "capture sink already open".into(),
            ));
        }
        let sink = self.backend.open(path, &self.profile).await?;
        self.sink = Some(sink);
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<(), CaptureError> {
        if !self.backend.supports_pause() {
            return Err(CaptureError::Unsupported("pause"));
        }
        match self.sink.as_mut() {
            Some(sink) => sink.pause().await,
            None => Err(CaptureError::NotOpen),
        }
    }

    pub async fn resume(&mut self) -> Result<(), CaptureError> {
        if !self.backend.supports_pause() {
            return Err(CaptureError::Unsupported("resume"));
        }
        match self.sink.as_mut() {
            Some(sink) => sink.resume().await,
            None => Err(CaptureError::NotOpen),
        }
    }

    /// Stop and release the sink, finalizing its file.
    ///
    /// Tolerates a sink that already stopped and a recorder with no sink:
    /// both are logged and treated as success, so the teardown path can
    /// call this unconditionally.
    pub async fn close(&mut self) -> Result<(), CaptureError> {
        let Some(mut sink) = self.sink.take() else {
            info!("close with no open sink; nothing to do");
            return Ok(());
        };
        match sink.stop().await {
            Ok(()) => Ok(()),
            Err(CaptureError::AlreadyStopped) => {
                warn!("capture sink was already stopped; treating close as success");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Finalize the current chunk and start capturing into `new_path`.
    ///
    /// If the new open fails the previous chunk is already safely closed;
    /// the error is surfaced so the scheduler can abandon rotation.
    pub async fn rotate(&mut self, new_path: &Path) -> Result<(), CaptureError> {
        self.close().await?;
        self.open(new_path).await
    }
}
