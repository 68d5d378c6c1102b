use tracing::{error, warn};

use crate::{
    dto::{lobby::GameStateView, ws::update_state_message},
    state::{
        SharedState,
        game::GameState,
        hub::{BroadcastReport, ConnectionId},
    },
};

/// Encode `state` as an `updateState` message.
pub fn encode_state(state: &GameState) -> Option<String> {
    match update_state_message(&GameStateView::from(state)) {
        Ok(message) => Some(message),
        Err(err) => {
            error!(error = %err, "failed to serialize lobby state");
            None
        }
    }
}

/// Push the current lobby state to every viewer.
///
/// The state is read under the lobby read lock, so a late broadcast can never
/// overwrite a newer one on the viewers' side.
pub async fn broadcast_state(state: &SharedState) -> BroadcastReport {
    let lobby = state.lobby().read().await;
    let Some(message) = encode_state(&lobby) else {
        return BroadcastReport::default();
    };
    let report = state.viewers().broadcast(message, None);
    drop(lobby);

    if !report.is_clean() {
        warn!(
            delivered = report.delivered,
            failed = report.failed.len(),
            "state broadcast could not reach every viewer"
        );
    }
    report
}

/// Push the current lobby state to a single viewer.
pub async fn send_state_to(state: &SharedState, id: &ConnectionId) -> bool {
    let lobby = state.lobby().read().await;
    let Some(message) = encode_state(&lobby) else {
        return false;
    };
    state.viewers().send_to(id, message)
}
