pub mod bridge;
pub mod capture;
pub mod config;
pub mod session;

pub use bridge::{
    create_router, AppState, BridgeError, ControllerView, Reconciler, WorkerClient,
};
pub use capture::{
    CaptureBackend, CaptureError, CaptureRecorder, CaptureSink, CpalBackend, EncoderProfile,
};
pub use config::Config;
pub use session::{
    ChunkPlan, KeepAlive, LogNotifier, LogWakeLock, NotificationPresenter, SessionManager,
    StateSnapshot, WakeLock,
};
