use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::capture::{CaptureBackend, CaptureError, CaptureRecorder, EncoderProfile};

use super::keepalive::KeepAlive;
use super::paths::ChunkPlan;
use super::snapshot::StateSnapshot;

/// Heartbeat period for the keep-alive notification refresh.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// The live, non-idle recording context. Exists iff state != Idle.
struct ActiveSession {
    /// Distinguishes this session's timer ticks from stale ones.
    epoch: u64,
    plan: ChunkPlan,
    /// Index of the chunk currently being written, starting at 1.
    chunk_index: u32,
    chunk_duration: Option<Duration>,
    paused: bool,
    /// Set after a failed rotation; no further rotation this session.
    rotation_abandoned: bool,
    recorder: CaptureRecorder,
    started_at: DateTime<Utc>,
    rotation_task: Option<JoinHandle<()>>,
    heartbeat_task: Option<JoinHandle<()>>,
}

impl ActiveSession {
    fn current_path(&self) -> String {
        self.plan.chunk_path(self.chunk_index).display().to_string()
    }

    fn notification_text(&self) -> String {
        if self.paused {
            format!("Recording paused: {}", self.current_path())
        } else {
            format!("Recording: {}", self.current_path())
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            is_recording: true,
            is_paused: self.paused,
            output_path: Some(self.current_path()),
        }
    }
}

/// Owns the session state machine and the single capture resource.
///
/// One instance is built at worker start and injected into the bridge;
/// there is no global. Every transition and every operation against the
/// capture sink runs under `inner`'s lock, so commands, rotation ticks and
/// heartbeats are serialized against each other.
pub struct SessionManager {
    backend: Arc<dyn CaptureBackend>,
    keepalive: Arc<KeepAlive>,
    profile: EncoderProfile,
    heartbeat_interval: Duration,
    epoch: AtomicU64,
    inner: Mutex<Option<ActiveSession>>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn CaptureBackend>, keepalive: Arc<KeepAlive>) -> Self {
        Self::with_heartbeat_interval(backend, keepalive, DEFAULT_HEARTBEAT_INTERVAL)
    }

    pub fn with_heartbeat_interval(
        backend: Arc<dyn CaptureBackend>,
        keepalive: Arc<KeepAlive>,
        heartbeat_interval: Duration,
    ) -> Self {
        Self {
            backend,
            keepalive,
            profile: EncoderProfile::default(),
            heartbeat_interval,
            epoch: AtomicU64::new(0),
            inner: Mutex::new(None),
        }
    }

    /// Idle -> Recording. Opens the capture resource on the first chunk
    /// file, engages the keep-alive duties and arms the timers.
    ///
    /// While non-idle this is a logged no-op returning `Ok(false)`; the
    /// running session is never restarted. A capture failure rolls back to
    /// Idle with nothing acquired and is propagated to the caller.
    pub async fn start(
        self: &Arc<Self>,
        output_path: &str,
        chunk_duration_ms: Option<u64>,
    ) -> Result<bool, CaptureError> {
        let mut guard = self.inner.lock().await;
        if guard.is_some() {
            warn!("start while a session is active; ignoring");
            return Ok(false);
        }

        let plan = ChunkPlan::new(output_path);
        let first_chunk = plan.chunk_path(1);
        let chunk_duration = chunk_duration_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let mut recorder = CaptureRecorder::new(Arc::clone(&self.backend), self.profile);
        // Nothing is engaged before this succeeds, so a failure here leaves
        // the worker exactly as it was: Idle, no wake-lock, no timers.
        recorder.open(&first_chunk).await?;

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let session = ActiveSession {
            epoch,
            plan,
            chunk_index: 1,
            chunk_duration,
            paused: false,
            rotation_abandoned: false,
            recorder,
            started_at: Utc::now(),
            rotation_task: None,
            heartbeat_task: None,
        };

        self.keepalive.engage(&session.notification_text());
        info!(
            path = %first_chunk.display(),
            chunk_ms = chunk_duration_ms.unwrap_or(0),
            "recording session started"
        );

        *guard = Some(session);
        let heartbeat = self.spawn_heartbeat(epoch);
        let rotation = chunk_duration.map(|period| self.spawn_rotation(epoch, period));
        if let Some(session) = guard.as_mut() {
            session.heartbeat_task = Some(heartbeat);
            session.rotation_task = rotation;
        }

        Ok(true)
    }

    /// Recording -> Paused. The chunk timer is cancelled (the index freezes
    /// at the current chunk); wake-lock and heartbeat keep running.
    pub async fn pause(&self) -> bool {
        let mut guard = self.inner.lock().await;
        let Some(session) = guard.as_mut() else {
            warn!("pause with no active session; ignoring");
            return false;
        };
        if session.paused {
            warn!("pause while already paused; ignoring");
            return false;
        }
        if session.rotation_abandoned {
            // The failed rotation left no open sink; the session only lives
            // on so the chunks written so far stay attributable until stop.
            warn!("pause after abandoned rotation; no capture sink to pause");
            return false;
        }

        match session.recorder.pause().await {
            Ok(()) => {
                if let Some(task) = session.rotation_task.take() {
                    task.abort();
                }
                session.paused = true;
                self.keepalive.refresh(&session.notification_text());
                info!("recording paused");
                true
            }
            Err(CaptureError::Unsupported(op)) => {
                warn!("{op} not supported by capture backend; state unchanged");
                false
            }
            Err(e) => {
                error!("pause failed: {e}; state unchanged");
                false
            }
        }
    }

    /// Paused -> Recording. The chunk timer restarts at the full configured
    /// period, not the remaining fraction in effect before the pause.
    pub async fn resume(self: &Arc<Self>) -> bool {
        let mut guard = self.inner.lock().await;
        let Some(session) = guard.as_mut() else {
            warn!("resume with no active session; ignoring");
            return false;
        };
        if !session.paused {
            warn!("resume while not paused; ignoring");
            return false;
        }
        if session.rotation_abandoned {
            warn!("resume after abandoned rotation; no capture sink to resume");
            return false;
        }

        match session.recorder.resume().await {
            Ok(()) => {
                session.paused = false;
                if !session.rotation_abandoned {
                    if let Some(period) = session.chunk_duration {
                        session.rotation_task = Some(self.spawn_rotation(session.epoch, period));
                    }
                }
                self.keepalive.refresh(&session.notification_text());
                info!("recording resumed");
                true
            }
            Err(CaptureError::Unsupported(op)) => {
                warn!("{op} not supported by capture backend; state unchanged");
                false
            }
            Err(e) => {
                error!("resume failed: {e}; state unchanged");
                false
            }
        }
    }

    /// Recording/Paused -> Idle. Releases the capture resource, wake-lock
    /// and notification exactly once; every step is best-effort so a
    /// failure in one never prevents the others.
    pub async fn stop(&self) -> bool {
        let mut guard = self.inner.lock().await;
        let Some(mut session) = guard.take() else {
            info!("stop while idle; nothing to do");
            return false;
        };

        if let Some(task) = session.rotation_task.take() {
            task.abort();
        }
        if let Some(task) = session.heartbeat_task.take() {
            task.abort();
        }
        // The lock stays held until the resource is released: a concurrent
        // `start` must not open a new sink while this one is still closing.
        if let Err(e) = session.recorder.close().await {
            error!("failed to release capture resource: {e}");
        }
        self.keepalive.disengage();
        drop(guard);

        let duration = Utc::now().signed_duration_since(session.started_at);
        info!(
            chunks = session.chunk_index,
            duration_secs = duration.num_milliseconds() as f64 / 1000.0,
            "recording session stopped"
        );
        true
    }

    /// Same effect as `stop`; safe to invoke any number of times. Used by
    /// the worker's shutdown path.
    pub async fn teardown(&self) {
        let _ = self.stop().await;
    }

    /// Point-in-time copy of the session state for the bridge.
    pub async fn snapshot(&self) -> StateSnapshot {
        let guard = self.inner.lock().await;
        match guard.as_ref() {
            Some(session) => session.snapshot(),
            None => StateSnapshot::idle(),
        }
    }

    /// Best-effort power-management exemption request; failures logged only.
    pub fn request_exemption(&self) {
        self.keepalive.request_exemption();
    }

    fn spawn_heartbeat(self: &Arc<Self>, epoch: u64) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let interval = self.heartbeat_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !manager.heartbeat_tick(epoch).await {
                    break;
                }
            }
        })
    }

    async fn heartbeat_tick(&self, epoch: u64) -> bool {
        let guard = self.inner.lock().await;
        match guard.as_ref() {
            Some(session) if session.epoch == epoch => {
                self.keepalive.refresh(&session.notification_text());
                true
            }
            _ => false,
        }
    }

    fn spawn_rotation(self: &Arc<Self>, epoch: u64, period: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                // Full period between rotations; time spent rotating is not
                // compensated, cumulative drift is accepted.
                tokio::time::sleep(period).await;
                if !manager.rotation_tick(epoch).await {
                    break;
                }
            }
        })
    }

    /// One chunk rotation: advance the index, rotate the recorder onto the
    /// next file, refresh the notification. Returns whether the timer
    /// should stay armed.
    async fn rotation_tick(&self, epoch: u64) -> bool {
        let mut guard = self.inner.lock().await;
        let Some(session) = guard.as_mut() else {
            return false;
        };
        if session.epoch != epoch || session.paused || session.rotation_abandoned {
            return false;
        }

        let next = session.chunk_index + 1;
        let path = session.plan.chunk_path(next);
        match session.recorder.rotate(&path).await {
            Ok(()) => {
                session.chunk_index = next;
                info!(chunk = next, path = %path.display(), "rotated to next chunk");
                self.keepalive.refresh(&session.notification_text());
                true
            }
            Err(e) => {
                // The finished chunk was already finalized by close(); only
                // the new open failed. No retries this session.
                error!("chunk rotation failed, abandoning rotation: {e}");
                session.rotation_abandoned = true;
                false
            }
        }
    }
}
