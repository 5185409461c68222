use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

/// OS directive preventing suspend while a session is live.
///
/// Held from the first `start` until the session returns to Idle, through
/// Paused as well: dropping the lock mid-pause risks losing the microphone
/// or being reclaimed, so pause deliberately keeps it.
pub trait WakeLock: Send + Sync {
    fn acquire(&self) -> Result<()>;
    fn release(&self) -> Result<()>;

    /// Best-effort request to exempt the worker from aggressive power
    /// management. Failures are logged by the caller, never surfaced.
    fn request_exemption(&self) -> Result<()> {
        Ok(())
    }
}

/// Renders the persistent "still alive" notification. External collaborator:
/// only the triggering conditions live here, not presentation details.
pub trait NotificationPresenter: Send + Sync {
    /// Show or refresh the single ongoing notification for this session.
    fn show(&self, text: &str) -> Result<()>;

    /// Remove the notification. Called exactly once per session.
    fn cancel(&self) -> Result<()>;
}

/// Wake-lock implementation that tracks held state and logs transitions.
/// Platform inhibitors plug in behind the same trait.
pub struct LogWakeLock {
    held: AtomicBool,
}

impl LogWakeLock {
    pub fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }
}

impl Default for LogWakeLock {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeLock for LogWakeLock {
    fn acquire(&self) -> Result<()> {
        if self.held.swap(true, Ordering::SeqCst) {
            warn!("wake-lock acquire while already held");
        } else {
            info!("wake-lock acquired");
        }
        Ok(())
    }

    fn release(&self) -> Result<()> {
        if self.held.swap(false, Ordering::SeqCst) {
            info!("wake-lock released");
        } else {
            warn!("wake-lock release while not held");
        }
        Ok(())
    }

    fn request_exemption(&self) -> Result<()> {
        info!("keep-alive exemption requested");
        Ok(())
    }
}

/// Notification presenter that only logs. Used on platforms without a
/// desktop notification daemon and in headless deployments.
pub struct LogNotifier;

impl NotificationPresenter for LogNotifier {
    fn show(&self, text: &str) -> Result<()> {
        info!(notification = text, "session notification");
        Ok(())
    }

    fn cancel(&self) -> Result<()> {
        info!("session notification cancelled");
        Ok(())
    }
}

#[cfg(target_os = "linux")]
pub use desktop::DesktopNotifier;

#[cfg(target_os = "linux")]
mod desktop {
    use std::sync::Mutex;

    use anyhow::{Context, Result};
    use notify_rust::{Hint, Notification, NotificationHandle, Timeout, Urgency};

    use super::NotificationPresenter;

    /// Desktop notification presenter. One notification handle is reused
    /// for the whole session: `show` updates it in place, `cancel` closes it.
    pub struct DesktopNotifier {
        handle: Mutex<Option<NotificationHandle>>,
    }

    impl DesktopNotifier {
        pub fn new() -> Self {
            Self {
                handle: Mutex::new(None),
            }
        }
    }

    impl Default for DesktopNotifier {
        fn default() -> Self {
            Self::new()
        }
    }

    impl NotificationPresenter for DesktopNotifier {
        fn show(&self, text: &str) -> Result<()> {
            let mut guard = self
                .handle
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            match guard.as_mut() {
                Some(handle) => {
                    handle.body(text);
                    handle.update();
                }
                None => {
                    let handle = Notification::new()
                        .appname("taperd")
                        .summary("Recording session")
                        .body(text)
                        .urgency(Urgency::Low)
                        .timeout(Timeout::Never)
                        .hint(Hint::Resident(true))
                        .show()
                        .context("failed to show session notification")?;
                    *guard = Some(handle);
                }
            }
            Ok(())
        }

        fn cancel(&self) -> Result<()> {
            let mut guard = self
                .handle
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(handle) = guard.take() {
                handle.close();
            }
            Ok(())
        }
    }
}

/// Binds the wake-lock and notification duties to the session lifecycle:
/// engaged exactly once per session, disengaged exactly once, refreshed on
/// every heartbeat while engaged.
pub struct KeepAlive {
    wake_lock: Arc<dyn WakeLock>,
    notifier: Arc<dyn NotificationPresenter>,
    engaged: AtomicBool,
}

impl KeepAlive {
    pub fn new(wake_lock: Arc<dyn WakeLock>, notifier: Arc<dyn NotificationPresenter>) -> Self {
        Self {
            wake_lock,
            notifier,
            engaged: AtomicBool::new(false),
        }
    }

    /// Acquire the wake-lock and show the ongoing notification.
    /// A second engage without a disengage is a logged no-op.
    pub fn engage(&self, text: &str) {
        if self.engaged.swap(true, Ordering::SeqCst) {
            warn!("keep-alive engage while already engaged");
            return;
        }
        if let Err(e) = self.wake_lock.acquire() {
            warn!("failed to acquire wake-lock: {e:#}");
        }
        if let Err(e) = self.notifier.show(text) {
            warn!("failed to show session notification: {e:#}");
        }
    }

    /// Heartbeat refresh of the notification content.
    pub fn refresh(&self, text: &str) {
        if !self.engaged.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.notifier.show(text) {
            warn!("failed to refresh session notification: {e:#}");
        }
    }

    /// Release the wake-lock and cancel the notification. Idempotent, and
    /// each step is best-effort: a failure releasing one resource never
    /// prevents releasing the other.
    pub fn disengage(&self) {
        if !self.engaged.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.wake_lock.release() {
            warn!("failed to release wake-lock: {e:#}");
        }
        if let Err(e) = self.notifier.cancel() {
            warn!("failed to cancel session notification: {e:#}");
        }
    }

    /// Fire-and-forget power-management exemption request.
    pub fn request_exemption(&self) {
        if let Err(e) = self.wake_lock.request_exemption() {
            warn!("keep-alive exemption request failed: {e:#}");
        }
    }
}
