use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use tracing::{error, info, warn};

use super::backend::{CaptureBackend, CaptureError, CaptureSink};
use super::profile::EncoderProfile;

/// Microphone capture backend: cpal input stream, WAV output via hound.
///
/// `cpal::Stream` is not `Send`, so each sink runs a dedicated thread that
/// owns the stream and the writer. The async handle talks to it over a
/// channel; pause/resume are atomics observed by the stream callback.
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

enum WriterMsg {
    Samples(Vec<i16>),
    Stop(tokio::sync::oneshot::Sender<Result<(), CaptureError>>),
}

#[async_trait::async_trait]
impl CaptureBackend for CpalBackend {
    fn supports_pause(&self) -> bool {
        true
    }

    async fn open(
        &self,
        path: &Path,
        profile: &EncoderProfile,
    ) -> Result<Box<dyn CaptureSink>, CaptureError> {
        let (msg_tx, msg_rx) = mpsc::channel::<WriterMsg>();
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        let paused = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread_path = path.to_path_buf();
        let thread_profile = *profile;
        let thread_paused = Arc::clone(&paused);
        let thread_shutdown = Arc::clone(&shutdown);
        let callback_tx = msg_tx.clone();

        let join = std::thread::Builder::new()
            .name("taperd-capture".into())
            .spawn(move || {
                capture_thread(
                    thread_path,
                    thread_profile,
                    callback_tx,
                    msg_rx,
                    ready_tx,
                    thread_paused,
                    thread_shutdown,
                );
            })
            .map_err(|e| CaptureError::Configuration(format!("spawn capture thread: {e}")))?;

        // Prepare+start handshake: the thread reports once the stream is
        // playing, or the setup error after it has released everything.
        match ready_rx.await {
            Ok(Ok(())) => Ok(Box::new(CpalSink {
                control: msg_tx,
                join: Some(join),
                paused,
                shutdown,
                stopped: false,
            })),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                let _ = join.join();
                Err(CaptureError::Configuration(
                    "capture thread exited before reporting readiness".into(),
                ))
            }
        }
    }
}

/// Owns the control channel into the capture thread.
struct CpalSink {
    control: mpsc::Sender<WriterMsg>,
    join: Option<JoinHandle<()>>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    stopped: bool,
}

#[async_trait::async_trait]
impl CaptureSink for CpalSink {
    async fn pause(&mut self) -> Result<(), CaptureError> {
        if self.stopped {
            return Err(CaptureError::AlreadyStopped);
        }
        self.paused.store(true, Ordering::Release);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        if self.stopped {
            return Err(CaptureError::AlreadyStopped);
        }
        self.paused.store(false, Ordering::Release);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if self.stopped {
            return Err(CaptureError::AlreadyStopped);
        }
        self.stopped = true;

        // Stop the callback writing before asking the thread to finalize,
        // so no samples land after the writer is closed.
        self.shutdown.store(true, Ordering::Release);

        let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();
        self.control
            .send(WriterMsg::Stop(ack_tx))
            .map_err(|_| CaptureError::Configuration("capture thread already gone".into()))?;

        let result = ack_rx
            .await
            .unwrap_or_else(|_| Err(CaptureError::Configuration("capture thread dropped ack".into())));

        if let Some(join) = self.join.take() {
            // Join off the async runtime; the thread exits right after the ack.
            let _ = tokio::task::spawn_blocking(move || join.join()).await;
        }

        result
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        if !self.stopped {
            warn!("capture sink dropped without stop; signalling thread shutdown");
            self.shutdown.store(true, Ordering::Release);
            let (ack_tx, _ack_rx) = tokio::sync::oneshot::channel();
            let _ = self.control.send(WriterMsg::Stop(ack_tx));
        }
    }
}

/// Runs on the dedicated capture thread: builds the stream, writes samples,
/// finalizes the WAV file on stop.
fn capture_thread(
    path: PathBuf,
    profile: EncoderProfile,
    callback_tx: mpsc::Sender<WriterMsg>,
    msg_rx: mpsc::Receiver<WriterMsg>,
    ready_tx: tokio::sync::oneshot::Sender<Result<(), CaptureError>>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
) {
    let setup = build_stream(&path, &profile, callback_tx, paused, shutdown);
    let (stream, mut writer) = match setup {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    info!(
        path = %path.display(),
        bit_rate = profile.bit_rate,
        sample_rate = profile.sample_rate,
        "capture started"
    );
    let _ = ready_tx.send(Ok(()));

    while let Ok(msg) = msg_rx.recv() {
        match msg {
            WriterMsg::Samples(samples) => {
                for sample in samples {
                    if let Err(e) = writer.write_sample(sample) {
                        error!("failed to write sample: {e}");
                        break;
                    }
                }
            }
            WriterMsg::Stop(ack) => {
                drop(stream);
                let result = writer
                    .finalize()
                    .map_err(|e| CaptureError::Configuration(format!("finalize WAV: {e}")));
                info!(path = %path.display(), "capture stopped");
                let _ = ack.send(result);
                return;
            }
        }
    }

    // All senders gone without a Stop: finalize what we have.
    drop(stream);
    if let Err(e) = writer.finalize() {
        warn!("failed to finalize WAV writer on channel close: {e}");
    }
}

type StreamParts = (cpal::Stream, hound::WavWriter<std::io::BufWriter<std::fs::File>>);

fn build_stream(
    path: &Path,
    profile: &EncoderProfile,
    callback_tx: mpsc::Sender<WriterMsg>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
) -> Result<StreamParts, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| CaptureError::Configuration("no default input device".into()))?;

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::Configuration(format!("query input config: {e}")))?;

    // Fixed profile sample rate; channel count follows the device default.
    let channels = supported.channels();
    let stream_config = StreamConfig {
        channels,
        sample_rate: SampleRate(profile.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let spec = hound::WavSpec {
        channels,
        sample_rate: profile.sample_rate,
        bits_per_sample: profile.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };
    let writer = hound::WavWriter::create(path, spec)
        .map_err(|e| CaptureError::Configuration(format!("create WAV file: {e}")))?;

    let err_fn = |e| error!("capture stream error: {e}");

    let stream = match supported.sample_format() {
        SampleFormat::F32 => {
            let tx = callback_tx.clone();
            let paused = Arc::clone(&paused);
            let shutdown = Arc::clone(&shutdown);
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if shutdown.load(Ordering::Acquire) || paused.load(Ordering::Acquire) {
                            return;
                        }
                        let samples: Vec<i16> = data
                            .iter()
                            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                            .collect();
                        let _ = tx.send(WriterMsg::Samples(samples));
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| CaptureError::Configuration(format!("build input stream: {e}")))?
        }
        SampleFormat::I16 => {
            let tx = callback_tx.clone();
            let paused = Arc::clone(&paused);
            let shutdown = Arc::clone(&shutdown);
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        if shutdown.load(Ordering::Acquire) || paused.load(Ordering::Acquire) {
                            return;
                        }
                        let _ = tx.send(WriterMsg::Samples(data.to_vec()));
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| CaptureError::Configuration(format!("build input stream: {e}")))?
        }
        other => {
            return Err(CaptureError::Configuration(format!(
                "unsupported sample format: {other:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| CaptureError::Configuration(format!("start input stream: {e}")))?;

    Ok((stream, writer))
}
