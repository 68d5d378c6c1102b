use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::validate_platform_id,
    presence::{ChannelSnapshot, PresenceMember},
};

/// Largest member list accepted in one snapshot.
pub const MAX_SNAPSHOT_MEMBERS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// Voice-channel member as forwarded by the chat bridge.
pub struct PresenceMemberPayload {
    /// Platform user id. Entries without an id are dropped when applied.
    #[serde(default)]
    pub id: Option<String>,
    /// Server nickname, preferred over the display name.
    #[serde(default)]
    pub nick: Option<String>,
    /// Global display name.
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// Full membership of a voice channel.
pub struct ChannelSnapshotPayload {
    /// Guild owning the channel.
    #[validate(custom(function = "validate_platform_id"))]
    pub guild_id: String,
    /// Voice channel id.
    #[validate(custom(function = "validate_platform_id"))]
    pub channel_id: String,
    /// Human-readable channel name.
    #[serde(default)]
    pub channel_name: String,
    /// Everyone currently connected to the channel.
    #[validate(length(max = MAX_SNAPSHOT_MEMBERS))]
    #[serde(default)]
    pub members: Vec<PresenceMemberPayload>,
}

#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// One member joining, leaving or moving between voice channels.
pub struct VoiceStatePayload {
    /// Platform user id of the member.
    #[validate(custom(function = "validate_platform_id"))]
    pub user_id: String,
    /// Server nickname.
    #[serde(default)]
    pub nick: Option<String>,
    /// Global display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Channel the member is now in; absent when they disconnected.
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Acknowledgement returned by the ingestion endpoints.
pub struct PresenceAck {
    /// Number of in-process subscribers that received the event.
    pub delivered: usize,
}

impl From<PresenceMemberPayload> for PresenceMember {
    fn from(value: PresenceMemberPayload) -> Self {
        Self {
            id: value.id.unwrap_or_default(),
            nick: value.nick,
            display_name: value.display_name,
        }
    }
}

impl From<ChannelSnapshotPayload> for ChannelSnapshot {
    fn from(value: ChannelSnapshotPayload) -> Self {
        Self {
            guild_id: value.guild_id,
            channel_id: value.channel_id,
            channel_name: value.channel_name,
            members: value.members.into_iter().map(Into::into).collect(),
        }
    }
}

impl VoiceStatePayload {
    /// Split into the member and their new channel.
    pub fn into_parts(self) -> (PresenceMember, Option<String>) {
        let member = PresenceMember {
            id: self.user_id,
            nick: self.nick,
            display_name: self.display_name,
        };
        let channel_id = self.channel_id.filter(|id| !id.is_empty());
        (member, channel_id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn snapshot_payload_rejects_empty_ids_and_oversized_lists() {
        let payload: ChannelSnapshotPayload = serde_json::from_value(json!({
            "guildId": "",
            "channelId": "c",
            "members": []
        }))
        .unwrap();
        assert!(payload.validate().is_err());

        let members: Vec<_> = (0..101).map(|i| json!({"id": i.to_string()})).collect();
        let payload: ChannelSnapshotPayload = serde_json::from_value(json!({
            "guildId": "g",
            "channelId": "c",
            "members": members
        }))
        .unwrap();
        assert!(payload.validate().is_err());

        let members: Vec<_> = (0..100).map(|i| json!({"id": i.to_string()})).collect();
        let payload: ChannelSnapshotPayload = serde_json::from_value(json!({
            "guildId": "g",
            "channelId": "c",
            "members": members
        }))
        .unwrap();
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn member_payload_serializes_in_camel_case() {
        let member = PresenceMemberPayload {
            id: Some("p1".into()),
            nick: None,
            display_name: Some("Alice".into()),
        };
        let value = serde_json::to_value(&member).unwrap();
        assert_eq!(value, json!({"id": "p1", "nick": null, "displayName": "Alice"}));
    }

    #[test]
    fn snapshot_payload_keeps_members_without_id_for_the_reconciler() {
        let payload: ChannelSnapshotPayload = serde_json::from_value(json!({
            "guildId": "g",
            "channelId": "c",
            "channelName": "lobby",
            "members": [{"nick": "ghost"}, {"id": "p1", "displayName": "Alice"}]
        }))
        .unwrap();
        assert!(payload.validate().is_ok());

        let snapshot = ChannelSnapshot::from(payload);
        assert_eq!(snapshot.members.len(), 2);
        assert_eq!(snapshot.members[0].id, "");
        assert_eq!(snapshot.members[1].display_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn empty_channel_id_means_disconnected() {
        let payload: VoiceStatePayload = serde_json::from_value(json!({
            "userId": "p1",
            "channelId": ""
        }))
        .unwrap();
        let (member, channel) = payload.into_parts();
        assert_eq!(member.id, "p1");
        assert_eq!(channel, None);
    }
}
