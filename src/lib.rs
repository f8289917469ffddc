//! Request and background-task tracking service.
//!
//! An axum app whose middleware records every inbound call in a shared
//! [`tracker::UnifiedTracker`], with read-only monitoring routes on top.

use std::sync::Arc;
use std::time::Instant;

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod tasks;
pub mod tracker;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Process-wide registry; middleware writes, monitoring routes read.
    pub tracker: Arc<tracker::UnifiedTracker>,

    pub config: config::Config,

    /// Anchor for the uptime reported by `/health`.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(tracker: Arc<tracker::UnifiedTracker>, config: config::Config) -> Self {
        Self {
            tracker,
            config,
            started_at: Instant::now(),
        }
    }
}
