use tracing::info;
use validator::Validate;

use crate::{
    dto::presence::{ChannelSnapshotPayload, PresenceAck, VoiceStatePayload},
    error::ServiceError,
    state::SharedState,
};

/// Validate and publish a full channel membership pushed by the chat bridge.
pub async fn ingest_snapshot(
    state: &SharedState,
    payload: ChannelSnapshotPayload,
) -> Result<PresenceAck, ServiceError> {
    payload
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    info!(
        guild_id = %payload.guild_id,
        channel_id = %payload.channel_id,
        members = payload.members.len(),
        "channel snapshot received"
    );
    let delivered = state.presence().publish_snapshot(payload.into()).await;
    Ok(PresenceAck { delivered })
}

/// Validate and publish one member's voice-state change.
pub async fn ingest_voice_state(
    state: &SharedState,
    payload: VoiceStatePayload,
) -> Result<PresenceAck, ServiceError> {
    payload
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let (member, channel_id) = payload.into_parts();
    let delivered = state
        .presence()
        .publish_voice_state(member, channel_id)
        .await;
    Ok(PresenceAck { delivered })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{config::AppConfig, presence::PresenceSource, state::AppState};

    fn state() -> SharedState {
        AppState::new(AppConfig {
            guild_id: "g".into(),
            channel_id: "c".into(),
            ..AppConfig::default()
        })
    }

    #[tokio::test]
    async fn invalid_snapshot_is_rejected_before_publishing() {
        let state = state();
        let mut events = state.presence().subscribe();
        let payload: ChannelSnapshotPayload =
            serde_json::from_value(json!({"guildId": "g", "channelId": "bad id"})).unwrap();

        let result = ingest_snapshot(&state, payload).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn valid_events_reach_subscribers() {
        let state = state();
        let _events = state.presence().subscribe();

        let snapshot: ChannelSnapshotPayload = serde_json::from_value(json!({
            "guildId": "g",
            "channelId": "c",
            "channelName": "General",
            "members": [{"id": "p1", "displayName": "Alice"}]
        }))
        .unwrap();
        assert_eq!(ingest_snapshot(&state, snapshot).await.unwrap().delivered, 1);

        let voice: VoiceStatePayload =
            serde_json::from_value(json!({"userId": "p1", "channelId": ""})).unwrap();
        assert_eq!(ingest_voice_state(&state, voice).await.unwrap().delivered, 1);

        let cached = state.presence().configured_channel().await.unwrap();
        assert!(cached.members.is_empty());
    }
}
