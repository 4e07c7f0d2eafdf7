//! Server-side core of a Socket.IO v0.7-era transport: wire codec,
//! session runtime, and the five HTTP/WebSocket transports that bind a
//! session's two queues to the outside world.

pub mod codec;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

use std::sync::Arc;

use crate::config::Config;
use crate::registry::Registry;

/// Shared state handed to every route handler.
pub struct AppState {
    pub registry: Arc<Registry>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let registry = Registry::new(
            std::time::Duration::from_secs(config.session_expire),
            std::time::Duration::from_secs(config.heartbeat_interval),
        );
        Arc::new(Self { registry, config })
    }
}
