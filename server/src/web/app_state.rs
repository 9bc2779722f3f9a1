use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::engine::relay_engine::RelayEngine;

/// Shared state handed to every HTTP and WebSocket handler.
pub struct AppState {
    pub engine: Arc<RelayEngine>,
    /// Cancelled on shutdown; open WebSocket sessions close when it fires.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(engine: Arc<RelayEngine>, shutdown: CancellationToken) -> Self {
        Self { engine, shutdown }
    }
}
