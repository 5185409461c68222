use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::session::StateSnapshot;

/// How often the controller re-queries the worker while it believes a
/// session may be active.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(5);

/// Per-request timeout for bridge calls. Handlers only do fast local work,
/// so anything slower means the worker is effectively gone.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The worker process is gone or not yet bound. Controllers treat this
    /// conservatively as not-recording.
    #[error("worker unreachable: {0}")]
    Unreachable(String),

    #[error("malformed bridge response: {0}")]
    Protocol(String),
}

/// Controller-side stub for the worker's command surface.
///
/// Command calls return plain `bool` like the bridge contract: internal
/// faults and unreachable workers all collapse to `false` (logged), never
/// an error the UI would have to handle.
pub struct WorkerClient {
    base_url: String,
    http: reqwest::Client,
}

impl WorkerClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build bridge HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub async fn start_recording(&self, output_path: &str, chunk_duration_ms: Option<u64>) -> bool {
        let body = json!({
            "outputPath": output_path,
            "chunkDurationMs": chunk_duration_ms,
        });
        self.post_bool("/recording/start", Some(body)).await
    }

    pub async fn stop_recording(&self) -> bool {
        self.post_bool("/recording/stop", None).await
    }

    pub async fn pause_recording(&self) -> bool {
        self.post_bool("/recording/pause", None).await
    }

    pub async fn resume_recording(&self) -> bool {
        self.post_bool("/recording/resume", None).await
    }

    pub async fn request_battery_exemption(&self) -> bool {
        self.post_bool("/power/exemption", None).await
    }

    /// The raw state query; callers decide how to treat unreachability.
    pub async fn recording_state(&self) -> Result<StateSnapshot, BridgeError> {
        let url = format!("{}/recording/state", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BridgeError::Unreachable(e.to_string()))?;
        resp.json::<StateSnapshot>()
            .await
            .map_err(|e| BridgeError::Protocol(e.to_string()))
    }

    /// State query with the conservative fallback: an unreachable worker
    /// reads as not-recording rather than an error.
    pub async fn snapshot_or_idle(&self) -> StateSnapshot {
        match self.recording_state().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("state query failed, assuming idle: {e}");
                StateSnapshot::idle()
            }
        }
    }

    async fn post_bool(&self, path: &str, body: Option<serde_json::Value>) -> bool {
        let url = format!("{}{}", self.base_url, path);
        let req = self.http.post(&url);
        let req = match body {
            Some(body) => req.json(&body),
            None => req,
        };
        match req.send().await {
            Ok(resp) => match resp.json::<bool>().await {
                Ok(ok) => ok,
                Err(e) => {
                    warn!("malformed response from {path}: {e}");
                    false
                }
            },
            Err(e) => {
                warn!("bridge call {path} failed: {e}");
                false
            }
        }
    }
}

/// The controller's cached view of the worker. The worker snapshot is
/// authoritative: on any divergence the cached view is discarded and the
/// remote snapshot adopted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerView {
    /// Whether the last query reached the worker.
    pub connected: bool,
    /// The adopted snapshot (idle when unreachable).
    pub snapshot: StateSnapshot,
    /// Last output path ever observed; survives disconnects and stop, so
    /// the controller can still point at the finished recording.
    pub last_output: Option<String>,
}

impl ControllerView {
    /// Fold one query result into the view. Returns true when the view
    /// changed (i.e. the cached copy disagreed and was replaced).
    pub fn observe(&mut self, result: Result<StateSnapshot, BridgeError>) -> bool {
        let next = match result {
            Ok(snapshot) => ControllerView {
                connected: true,
                last_output: snapshot.output_path.clone().or_else(|| self.last_output.clone()),
                snapshot,
            },
            Err(_) => ControllerView {
                connected: false,
                snapshot: StateSnapshot::idle(),
                last_output: self.last_output.clone(),
            },
        };
        if next != *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

/// Periodic reconciliation loop: queries the worker on startup and every
/// `interval` thereafter, publishing view changes over a watch channel.
pub struct Reconciler {
    client: WorkerClient,
    interval: Duration,
}

impl Reconciler {
    pub fn new(client: WorkerClient) -> Self {
        Self::with_interval(client, RECONCILE_INTERVAL)
    }

    pub fn with_interval(client: WorkerClient, interval: Duration) -> Self {
        Self { client, interval }
    }

    /// Spawn the loop. The receiver observes every adopted view; dropping
    /// all receivers stops the loop.
    pub fn spawn(self) -> (watch::Receiver<ControllerView>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(ControllerView::default());
        let handle = tokio::spawn(async move {
            let mut view = ControllerView::default();
            let mut was_connected = false;
            loop {
                let result = self.client.recording_state().await;
                if view.observe(result) {
                    if view.connected && !was_connected {
                        info!("worker reachable, adopted remote snapshot");
                    } else if !view.connected && was_connected {
                        warn!("worker unreachable, assuming not recording");
                    }
                    was_connected = view.connected;
                    if tx.send(view.clone()).is_err() {
                        break;
                    }
                }
                tokio::time::sleep(self.interval).await;
            }
        });
        (rx, handle)
    }
}
