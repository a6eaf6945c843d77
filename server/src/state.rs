use std::time::Duration;

use crate::config::Config;
use crate::db::DbPool;
use crate::tabs::service::TabService;

/// WebSocket keepalive timing.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    /// Server sends a WebSocket ping this often.
    pub ping_interval: Duration,
    /// Close the connection if the pong takes longer than this.
    pub pong_timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

impl Heartbeat {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_secs.max(1)),
            pong_timeout: Duration::from_secs(config.pong_timeout_secs.max(1)),
        }
    }
}

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex> (flagged URL catalog)
    pub db: DbPool,
    /// Tab state, live connections and the broadcast pipeline
    pub tabs: TabService,
    pub heartbeat: Heartbeat,
}

impl AppState {
    pub fn new(db: DbPool, heartbeat: Heartbeat) -> Self {
        Self {
            db,
            tabs: TabService::new(),
            heartbeat,
        }
    }
}
