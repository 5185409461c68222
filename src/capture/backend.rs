use std::path::Path;

use thiserror::Error;

use super::profile::EncoderProfile;

/// Errors raised by capture backends and the recorder that owns them.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Device setup, prepare or start failed while opening a sink.
    #[error("capture device configuration failed: {0}")]
    Configuration(String),

    /// The backend lacks the requested capability (e.g. pause).
    #[error("capture backend does not support {0}")]
    Unsupported(&'static str),

    /// The sink was already stopped when a stop/close arrived.
    /// Callers on the teardown path treat this as success.
    #[error("capture sink already stopped")]
    AlreadyStopped,

    /// An operation required an open sink but none exists.
    #[error("no open capture sink")]
    NotOpen,

    #[error("capture i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A live capture handle writing to exactly one output file.
///
/// Implementations own the platform resource; dropping a sink without
/// calling `stop` must not leak it, but the file may be left unfinalized.
#[async_trait::async_trait]
pub trait CaptureSink: Send {
    /// Suspend capture without releasing the resource.
    async fn pause(&mut self) -> Result<(), CaptureError>;

    /// Continue capture after a pause.
    async fn resume(&mut self) -> Result<(), CaptureError>;

    /// Stop capture and finalize the output file. A second stop returns
    /// `CaptureError::AlreadyStopped`.
    async fn stop(&mut self) -> Result<(), CaptureError>;
}

/// Capture backend factory trait.
///
/// Implementations:
/// - `CpalBackend`: microphone input via cpal, WAV output via hound
/// - test doubles with scripted failures and call counting
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Whether sinks from this backend can pause/resume.
    fn supports_pause(&self) -> bool;

    /// Configure the encoder profile and start capturing into `path`.
    ///
    /// Prepare and start are atomic from the caller's perspective: on any
    /// sub-step failure the partial handle is released before the error
    /// is returned, never left half-initialized.
    async fn open(
        &self,
        path: &Path,
        profile: &EncoderProfile,
    ) -> Result<Box<dyn CaptureSink>, CaptureError>;
}
