//! Feeds presence events from the chat bridge into the lobby roster.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{
    presence::{ChannelSnapshot, PresenceEvent, PresenceMember, PresenceSource},
    services::{roster, state_events},
    state::SharedState,
};

/// Consume `source` until it closes, reconciling and broadcasting after every
/// relevant event.
pub async fn run(state: SharedState, source: Arc<dyn PresenceSource>) {
    let mut events = source.subscribe();
    info!("presence listener started");

    loop {
        match events.recv().await {
            Ok(event) => {
                handle_event(&state, event).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "presence listener lagged; resyncing the channel");
                match source.configured_channel().await {
                    Ok(snapshot) => {
                        handle_event(&state, PresenceEvent::ChannelSnapshot(snapshot)).await;
                    }
                    Err(err) => warn!(error = %err, "presence resync failed"),
                }
            }
            Err(RecvError::Closed) => {
                info!("presence source closed; listener stopping");
                break;
            }
        }
    }
}

/// Apply one presence event. Returns whether the lobby changed and viewers
/// were notified.
pub async fn handle_event(state: &SharedState, event: PresenceEvent) -> bool {
    match event {
        PresenceEvent::ChannelSnapshot(snapshot) => on_snapshot(state, snapshot).await,
        PresenceEvent::VoiceStateChanged { member, channel_id } => {
            on_voice_state(state, member, channel_id).await
        }
    }
}

async fn on_snapshot(state: &SharedState, snapshot: ChannelSnapshot) -> bool {
    let config = state.config();
    if snapshot.guild_id != config.guild_id || snapshot.channel_id != config.channel_id {
        info!(
            guild_id = %snapshot.guild_id,
            channel_id = %snapshot.channel_id,
            "snapshot of an unrelated channel ignored"
        );
        return false;
    }

    roster::apply_snapshot(state, snapshot).await;
    state_events::broadcast_state(state).await;
    true
}

async fn on_voice_state(
    state: &SharedState,
    member: PresenceMember,
    channel_id: Option<String>,
) -> bool {
    let joined = channel_id.as_deref() == Some(state.config().channel_id.as_str());
    let known = {
        let lobby = state.lobby().read().await;
        lobby.available_players.contains_key(&member.id)
            || lobby.players.iter().any(|slot| slot.player.id == member.id)
    };
    if !joined && !known {
        debug!(player_id = %member.id, "voice-state change outside the lobby channel");
        return false;
    }

    roster::apply_voice_state(state, member, channel_id).await;
    state_events::broadcast_state(state).await;
    true
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::AppConfig,
        state::{AppState, hub::ViewerConnection},
    };

    fn config() -> AppConfig {
        AppConfig {
            guild_id: "guild".into(),
            channel_id: "voice".into(),
            ..AppConfig::default()
        }
    }

    fn member(id: &str) -> PresenceMember {
        PresenceMember {
            id: id.into(),
            nick: None,
            display_name: Some(id.to_uppercase()),
        }
    }

    fn snapshot(guild: &str, channel: &str, members: &[&str]) -> ChannelSnapshot {
        ChannelSnapshot {
            guild_id: guild.into(),
            channel_id: channel.into(),
            channel_name: "General".into(),
            members: members.iter().map(|id| member(id)).collect(),
        }
    }

    #[tokio::test]
    async fn snapshot_of_configured_channel_reconciles_and_broadcasts() {
        let state = AppState::new(config());
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.viewers().register(
            ViewerConnection {
                id: Uuid::new_v4(),
                tx,
            },
            "hello".to_owned(),
        );
        rx.recv().await;

        let event = PresenceEvent::ChannelSnapshot(snapshot("guild", "voice", &["p1", "p2"]));
        assert!(handle_event(&state, event).await);

        let lobby = state.lobby().snapshot().await;
        assert_eq!(lobby.available_players.len(), 2);
        assert_eq!(lobby.channel_name, "General");
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn snapshot_of_other_channel_is_ignored() {
        let state = AppState::new(config());
        let event = PresenceEvent::ChannelSnapshot(snapshot("guild", "elsewhere", &["p1"]));

        assert!(!handle_event(&state, event).await);
        assert!(state.lobby().snapshot().await.available_players.is_empty());
    }

    #[tokio::test]
    async fn join_then_leave_round_trips_the_slot() {
        let state = AppState::new(config());

        let joined = PresenceEvent::VoiceStateChanged {
            member: member("p1"),
            channel_id: Some("voice".into()),
        };
        assert!(handle_event(&state, joined).await);
        assert_eq!(state.lobby().snapshot().await.players[0].player.id, "p1");

        let unrelated = PresenceEvent::VoiceStateChanged {
            member: member("p9"),
            channel_id: Some("elsewhere".into()),
        };
        assert!(!handle_event(&state, unrelated).await);

        let left = PresenceEvent::VoiceStateChanged {
            member: member("p1"),
            channel_id: None,
        };
        assert!(handle_event(&state, left).await);
        let lobby = state.lobby().snapshot().await;
        assert!(!lobby.players[0].is_occupied());
        assert!(lobby.available_players.is_empty());
    }

    #[tokio::test]
    async fn unnamed_snapshot_keeps_the_channel_name() {
        let state = AppState::new(config());
        let named = PresenceEvent::ChannelSnapshot(snapshot("guild", "voice", &["p1"]));
        assert!(handle_event(&state, named).await);

        let unnamed = ChannelSnapshot {
            channel_name: String::new(),
            ..snapshot("guild", "voice", &["p1", "p2"])
        };
        assert!(handle_event(&state, PresenceEvent::ChannelSnapshot(unnamed)).await);

        let lobby = state.lobby().snapshot().await;
        assert_eq!(lobby.channel_name, "General");
        assert_eq!(lobby.available_players.len(), 2);
    }
}
