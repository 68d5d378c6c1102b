use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of viewer sockets currently registered.
    pub viewers: usize,
}

impl HealthResponse {
    /// Storage reachable; every lobby action is available.
    pub fn ok(viewers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            viewers,
        }
    }

    /// Storage unreachable; rolls and resets are rejected until it returns.
    pub fn degraded(viewers: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            viewers,
        }
    }
}
