#![allow(dead_code)]

// Mock collaborators with call counting, used to verify the session
// manager's resource discipline (open/release exactly once, etc).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taperd::capture::{CaptureBackend, CaptureError, CaptureSink, EncoderProfile};
use taperd::session::{KeepAlive, NotificationPresenter, SessionManager, WakeLock};

#[derive(Default)]
pub struct MockCounters {
    pub opens: AtomicUsize,
    pub stops: AtomicUsize,
    pub pauses: AtomicUsize,
    pub resumes: AtomicUsize,
}

pub struct MockBackend {
    supports_pause: bool,
    /// 1-based ordinal of the open call that fails, if any.
    fail_open_at: Option<usize>,
    /// How long a sink's `stop` takes, to expose overlapping resource ops.
    close_delay: Option<Duration>,
    closing: Arc<AtomicBool>,
    overlapping_opens: AtomicUsize,
    pub counters: Arc<MockCounters>,
    pub opened_paths: Mutex<Vec<PathBuf>>,
}

impl MockBackend {
    fn build(
        supports_pause: bool,
        fail_open_at: Option<usize>,
        close_delay: Option<Duration>,
    ) -> Arc<Self> {
        Arc::new(Self {
            supports_pause,
            fail_open_at,
            close_delay,
            closing: Arc::new(AtomicBool::new(false)),
            overlapping_opens: AtomicUsize::new(0),
            counters: Arc::new(MockCounters::default()),
            opened_paths: Mutex::new(Vec::new()),
        })
    }

    pub fn new() -> Arc<Self> {
        Self::build(true, None, None)
    }

    pub fn without_pause() -> Arc<Self> {
        Self::build(false, None, None)
    }

    pub fn failing_open_at(ordinal: usize) -> Arc<Self> {
        Self::build(true, Some(ordinal), None)
    }

    pub fn with_slow_close(delay: Duration) -> Arc<Self> {
        Self::build(true, None, Some(delay))
    }

    pub fn opens(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.counters.pauses.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.opened_paths.lock().unwrap().clone()
    }

    /// Opens that began while another sink's `stop` was still in flight.
    pub fn overlapping_opens(&self) -> usize {
        self.overlapping_opens.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MockBackend {
    fn supports_pause(&self) -> bool {
        self.supports_pause
    }

    async fn open(
        &self,
        path: &Path,
        _profile: &EncoderProfile,
    ) -> Result<Box<dyn CaptureSink>, CaptureError> {
        let ordinal = self.counters.opens.fetch_add(1, Ordering::SeqCst) + 1;
        if self.closing.load(Ordering::SeqCst) {
            self.overlapping_opens.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail_open_at == Some(ordinal) {
            return Err(CaptureError::Configuration("scripted open failure".into()));
        }
        self.opened_paths.lock().unwrap().push(path.to_path_buf());
        Ok(Box::new(MockSink {
            stopped: false,
            close_delay: self.close_delay,
            closing: Arc::clone(&self.closing),
            counters: Arc::clone(&self.counters),
        }))
    }
}

pub struct MockSink {
    stopped: bool,
    close_delay: Option<Duration>,
    closing: Arc<AtomicBool>,
    counters: Arc<MockCounters>,
}

#[async_trait::async_trait]
impl CaptureSink for MockSink {
    async fn pause(&mut self) -> Result<(), CaptureError> {
        self.counters.pauses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        self.counters.resumes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        if self.stopped {
            return Err(CaptureError::AlreadyStopped);
        }
        self.stopped = true;
        if let Some(delay) = self.close_delay {
            self.closing.store(true, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.closing.store(false, Ordering::SeqCst);
        }
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockWakeLock {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub exemptions: AtomicUsize,
}

impl WakeLock for MockWakeLock {
    fn acquire(&self) -> anyhow::Result<()> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> anyhow::Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn request_exemption(&self) -> anyhow::Result<()> {
        self.exemptions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub shown: Mutex<Vec<String>>,
    pub cancels: AtomicUsize,
}

impl NotificationPresenter for MockNotifier {
    fn show(&self, text: &str) -> anyhow::Result<()> {
        self.shown.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn cancel(&self) -> anyhow::Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub manager: Arc<SessionManager>,
    pub backend: Arc<MockBackend>,
    pub wake: Arc<MockWakeLock>,
    pub notifier: Arc<MockNotifier>,
}

pub fn harness(backend: Arc<MockBackend>) -> Harness {
    let wake = Arc::new(MockWakeLock::default());
    let notifier = Arc::new(MockNotifier::default());
    let keepalive = Arc::new(KeepAlive::new(
        Arc::clone(&wake) as Arc<dyn WakeLock>,
        Arc::clone(&notifier) as Arc<dyn NotificationPresenter>,
    ));
    let manager = Arc::new(SessionManager::new(
        Arc::clone(&backend) as Arc<dyn CaptureBackend>,
        keepalive,
    ));
    Harness {
        manager,
        backend,
        wake,
        notifier,
    }
}

/// Let spawned timer tasks run after a clock advance.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused test clock as continuous time: small steps with task
/// settling in between, so periodic timers re-armed mid-advance still fire
/// on their real schedule.
pub async fn advance_ms(total: u64) {
    // Let tasks spawned just before this call register their timers at the
    // current clock time, before the first step moves it.
    settle().await;
    let mut remaining = total;
    while remaining > 0 {
        let step = remaining.min(100);
        tokio::time::advance(std::time::Duration::from_millis(step)).await;
        settle().await;
        remaining -= step;
    }
}
