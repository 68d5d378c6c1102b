use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage health along with the number of connected viewers.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_roll_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "roll store health check failed");
            }
        }
        Err(_) => warn!("roll store unavailable (degraded mode)"),
    }

    let viewers = state.viewers().len();
    if state.is_degraded() {
        HealthResponse::degraded(viewers)
    } else {
        HealthResponse::ok(viewers)
    }
}
