//! Shared application state.

use tablerag_core::EngineConfig;
use tablerag_engine::Engine;
use tokio_util::sync::CancellationToken;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: EngineConfig,
    pub engine: Engine,
    /// Cancelled on shutdown; in-flight builds observe it between rows.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: EngineConfig, engine: Engine) -> Self {
        Self {
            config,
            engine,
            shutdown: CancellationToken::new(),
        }
    }
}
