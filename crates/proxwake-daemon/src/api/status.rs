//! Controller status endpoint.

use axum::extract::State;
use axum::Json;
use proxwake_core::ControllerStatus;
use serde::{Deserialize, Serialize};

use crate::state::SharedState;

/// Controller status response.
///
/// The controller fields are flattened into the top-level object, so
/// `phase`, `cycles_remaining`, and the counters sit beside `uptime_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Seconds since the daemon started.
    pub uptime_secs: u64,

    /// Phase, counters, and last wake.
    #[serde(flatten)]
    pub controller: ControllerStatus,
}

/// Snapshot of the presence controller.
pub async fn get_status(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        uptime_secs: state.uptime_secs(),
        controller: state.status(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::api::health::HealthResponse;
    use crate::state::AppState;
    use axum_test::TestServer;
    use proxwake_core::ScanKind;
    use tokio::sync::watch;

    fn idle_status() -> ControllerStatus {
        ControllerStatus {
            phase: ScanKind::Ble,
            cycles_remaining: 0,
            discoveries: 0,
            matches: 0,
            wakes_sent: 0,
            wakes_suppressed: 0,
            wake_failures: 0,
            radio_errors: 0,
            last_wake_at_ms: None,
            last_wake_at_utc: None,
            last_match: None,
        }
    }

    #[tokio::test]
    async fn test_status_tracks_controller_updates() {
        let (tx, rx) = watch::channel(idle_status());
        let server = TestServer::new(create_router(AppState::new(rx).shared())).unwrap();

        let response = server.get("/api/status").await;
        response.assert_status_ok();
        let body: StatusResponse = response.json();
        assert_eq!(body.controller, idle_status());

        tx.send_modify(|status| {
            status.phase = ScanKind::Classic;
            status.cycles_remaining = 3;
            status.wakes_sent = 1;
            status.last_match = Some("aa:bb:cc:dd:ee:ff".to_string());
        });

        let json: serde_json::Value = server.get("/api/status").await.json();
        assert_eq!(json["phase"], "classic");
        assert_eq!(json["cycles_remaining"], 3);
        assert_eq!(json["wakes_sent"], 1);
        assert_eq!(json["last_match"], "aa:bb:cc:dd:ee:ff");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_tx, rx) = watch::channel(idle_status());
        let server = TestServer::new(create_router(AppState::new(rx).shared())).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: HealthResponse = response.json();
        assert_eq!(body.status, "ok");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (_tx, rx) = watch::channel(idle_status());
        let server = TestServer::new(create_router(AppState::new(rx).shared())).unwrap();

        server.get("/api/wake").await.assert_status_not_found();
    }
}
