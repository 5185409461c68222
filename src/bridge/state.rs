use std::sync::Arc;

use crate::session::SessionManager;

/// Shared state for the bridge handlers: the one session manager built at
/// worker start.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
}

impl AppState {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}
