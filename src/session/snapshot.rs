use serde::{Deserialize, Serialize};

/// Point-in-time copy of the worker's session state, exposed across the
/// process boundary. The worker's copy is authoritative; the controller
/// adopts this snapshot whenever its cached view disagrees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub is_recording: bool,
    pub is_paused: bool,
    /// Path of the chunk currently being written, `None` while idle.
    pub output_path: Option<String>,
}

impl StateSnapshot {
    /// The conservative view used when the worker is unreachable.
    pub fn idle() -> Self {
        Self::default()
    }
}
