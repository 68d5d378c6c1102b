use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::ClientAction,
    services::{lobby_service, state_events},
    state::{
        SharedState,
        hub::{ConnectionId, ViewerConnection},
    },
};

/// Handle the full lifecycle for an individual viewer WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    if !register_viewer(&state, connection_id, outbound_tx.clone()).await {
        warn!(%connection_id, "viewer gone before the initial state was sent");
        state.viewers().unregister(&connection_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }
    info!(%connection_id, viewers = state.viewers().len(), "viewer connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientAction::from_json_str(text.as_str()) {
                Ok(action) => {
                    debug!(%connection_id, action = action.name(), "viewer action received");
                    // Actions run to completion even if the viewer disconnects meanwhile.
                    let state = state.clone();
                    tokio::spawn(async move {
                        lobby_service::handle_action(&state, connection_id, action).await;
                    });
                }
                Err(err) => {
                    warn!(%connection_id, error = %err, "ignoring viewer message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%connection_id, "viewer requested close");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%connection_id, error = %err, "websocket receive error");
                break;
            }
        }
    }

    state.viewers().unregister(&connection_id);
    info!(%connection_id, viewers = state.viewers().len(), "viewer disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Register a viewer and greet it with the current state.
///
/// Both happen under the lobby read lock so no commit can slip in between the
/// greeting and the first broadcast the viewer receives.
pub async fn register_viewer(
    state: &SharedState,
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Message>,
) -> bool {
    let lobby = state.lobby().read().await;
    let Some(greeting) = state_events::encode_state(&lobby) else {
        return false;
    };
    state.viewers().register(ViewerConnection { id, tx }, greeting)
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn registration_greets_with_current_state() {
        let state = AppState::new(AppConfig::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        assert!(register_viewer(&state, id, tx).await);
        assert_eq!(state.viewers().len(), 1);

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text greeting");
        };
        let envelope: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(envelope["action"], "updateState");
        let content: serde_json::Value =
            serde_json::from_str(envelope["content"].as_str().unwrap()).unwrap();
        assert_eq!(content["rollCount"], 0);
        assert_eq!(content["canRoll"], true);
    }

    #[tokio::test]
    async fn closed_writer_fails_registration() {
        let state = AppState::new(AppConfig::default());
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        assert!(!register_viewer(&state, Uuid::new_v4(), tx).await);
    }
}
