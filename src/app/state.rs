//! Application state shared across routes

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::session::{SessionCoordinator, SessionHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub session: SessionHandle,
}

impl AppState {
    /// Build the state together with the coordinator that still has to be
    /// spawned
    pub fn new(config: ServerConfig) -> (Self, SessionCoordinator) {
        let config = Arc::new(config);

        // Exactly one session per process
        let (coordinator, session) = SessionCoordinator::new();

        (Self { config, session }, coordinator)
    }
}
