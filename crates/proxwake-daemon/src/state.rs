//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Instant;

use proxwake_core::ControllerStatus;
use tokio::sync::watch;

/// Shared application state.
pub type SharedState = Arc<AppState>;

/// Read-only view of the running controller.
#[derive(Debug)]
pub struct AppState {
    status: watch::Receiver<ControllerStatus>,
    started_at: Instant,
}

impl AppState {
    /// Create state from the controller's status channel.
    #[must_use]
    pub fn new(status: watch::Receiver<ControllerStatus>) -> Self {
        Self {
            status,
            started_at: Instant::now(),
        }
    }

    /// Wrap in an [`Arc`] for the router.
    #[must_use]
    pub fn shared(self) -> SharedState {
        Arc::new(self)
    }

    /// Latest controller status.
    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    /// Seconds since the daemon started.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
