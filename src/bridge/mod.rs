//! Request/response bridge between the controller process and the worker.
//!
//! Worker side: an axum router exposing the fixed command surface
//! (start/stop/pause/resume/state/exemption). Controller side: the
//! `WorkerClient` stub plus the `Reconciler` loop that adopts the worker's
//! snapshot as truth whenever the cached view diverges.

pub mod client;
pub mod handlers;
pub mod routes;
pub mod state;

pub use client::{BridgeError, ControllerView, Reconciler, WorkerClient, RECONCILE_INTERVAL};
pub use routes::create_router;
pub use state::AppState;
