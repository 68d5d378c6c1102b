//! Voice-channel presence: the events the lobby subscribes to and the query
//! it runs to re-read the configured channel.

/// In-process presence source fed over HTTP.
pub mod hub;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::broadcast;

pub use hub::PresenceHub;

/// Member of a voice channel as reported by the chat platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceMember {
    /// Platform user id. Members without one are dropped by the reconciler.
    pub id: String,
    /// Per-guild nickname.
    pub nick: Option<String>,
    /// Global display name, used when no nickname is set.
    pub display_name: Option<String>,
}

impl PresenceMember {
    /// Nickname when set, otherwise the display name.
    pub fn preferred_name(&self) -> Option<&str> {
        self.nick
            .as_deref()
            .filter(|nick| !nick.is_empty())
            .or_else(|| self.display_name.as_deref().filter(|name| !name.is_empty()))
    }
}

/// Full membership of one voice channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSnapshot {
    /// Guild owning the channel.
    pub guild_id: String,
    /// Voice channel id.
    pub channel_id: String,
    /// Human-readable channel name; empty when unknown.
    pub channel_name: String,
    /// Everyone currently connected.
    pub members: Vec<PresenceMember>,
}

/// Events emitted by a [`PresenceSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Complete membership of a channel, e.g. when the bridge joins a guild.
    ChannelSnapshot(ChannelSnapshot),
    /// A single member joined, left or moved. `channel_id` is `None` on
    /// disconnect.
    VoiceStateChanged {
        /// Member whose voice state changed.
        member: PresenceMember,
        /// Channel the member is now in.
        channel_id: Option<String>,
    },
}

/// Failures of a [`PresenceSource`] query.
#[derive(Debug, Error)]
pub enum PresenceError {
    /// Nothing is known yet about the channel.
    #[error("no membership known yet for channel `{0}`")]
    ChannelUnknown(String),
    /// The source cannot answer.
    #[error("presence source unavailable: {0}")]
    Unavailable(String),
}

/// Subscription interface to the chat platform.
pub trait PresenceSource: Send + Sync {
    /// Receive every presence event published from now on.
    fn subscribe(&self) -> broadcast::Receiver<PresenceEvent>;
    /// Current membership of the configured voice channel.
    fn configured_channel(&self) -> BoxFuture<'static, Result<ChannelSnapshot, PresenceError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_name_falls_back_to_display_name() {
        let member = PresenceMember {
            id: "1".into(),
            nick: Some(String::new()),
            display_name: Some("Alice".into()),
        };
        assert_eq!(member.preferred_name(), Some("Alice"));

        let member = PresenceMember {
            nick: Some("Ally".into()),
            ..member
        };
        assert_eq!(member.preferred_name(), Some("Ally"));

        assert_eq!(PresenceMember::default().preferred_name(), None);
    }
}
