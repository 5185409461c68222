//! Recording session management
//!
//! This module owns everything with real state in the worker:
//! - `SessionManager`: the Idle/Recording/Paused state machine and the
//!   single sequencer all commands and timer ticks serialize on
//! - chunk path derivation and rotation scheduling
//! - keep-alive duties (wake-lock + persistent notification heartbeat)
//! - the `StateSnapshot` exposed across the process boundary

pub mod keepalive;
pub mod manager;
pub mod paths;
pub mod snapshot;

pub use keepalive::{KeepAlive, LogNotifier, LogWakeLock, NotificationPresenter, WakeLock};
pub use manager::{SessionManager, DEFAULT_HEARTBEAT_INTERVAL};
pub use paths::ChunkPlan;
pub use snapshot::StateSnapshot;

#[cfg(target_os = "linux")]
pub use keepalive::DesktopNotifier;
