use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use super::{ChannelSnapshot, PresenceError, PresenceEvent, PresenceMember, PresenceSource};

/// In-process [`PresenceSource`] fed by an external chat-platform bridge.
///
/// Keeps the last snapshot of the configured channel and folds voice-state
/// changes into it, so [`PresenceSource::configured_channel`] answers locally.
#[derive(Clone)]
pub struct PresenceHub {
    events: broadcast::Sender<PresenceEvent>,
    guild_id: String,
    channel_id: String,
    cached: Arc<RwLock<Option<ChannelSnapshot>>>,
}

impl PresenceHub {
    /// Create a hub watching `channel_id` in `guild_id`, buffering up to
    /// `capacity` events per lagging subscriber.
    pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>, capacity: usize) -> Self {
        let (events, _rx) = broadcast::channel(capacity.max(1));
        Self {
            events,
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Guild of the watched channel.
    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    /// Watched voice channel.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Publish a full channel membership. Returns the number of subscribers
    /// that received it.
    pub async fn publish_snapshot(&self, snapshot: ChannelSnapshot) -> usize {
        if snapshot.guild_id == self.guild_id && snapshot.channel_id == self.channel_id {
            *self.cached.write().await = Some(snapshot.clone());
        }
        self.send(PresenceEvent::ChannelSnapshot(snapshot))
    }

    /// Publish a single member's voice-state change.
    ///
    /// A join to the configured channel before any snapshot starts an unnamed
    /// snapshot holding only that member.
    pub async fn publish_voice_state(
        &self,
        member: PresenceMember,
        channel_id: Option<String>,
    ) -> usize {
        let joined = channel_id.as_deref() == Some(self.channel_id.as_str());
        {
            let mut cached = self.cached.write().await;
            if cached.is_none() && joined {
                *cached = Some(ChannelSnapshot {
                    guild_id: self.guild_id.clone(),
                    channel_id: self.channel_id.clone(),
                    channel_name: String::new(),
                    members: Vec::new(),
                });
            }
            if let Some(snapshot) = cached.as_mut() {
                snapshot.members.retain(|existing| existing.id != member.id);
                if joined {
                    snapshot.members.push(member.clone());
                }
            }
        }
        self.send(PresenceEvent::VoiceStateChanged { member, channel_id })
    }

    fn send(&self, event: PresenceEvent) -> usize {
        match self.events.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("presence event dropped: no subscriber");
                0
            }
        }
    }
}

impl PresenceSource for PresenceHub {
    fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.events.subscribe()
    }

    fn configured_channel(&self) -> BoxFuture<'static, Result<ChannelSnapshot, PresenceError>> {
        let cached = self.cached.clone();
        let channel_id = self.channel_id.clone();
        Box::pin(async move {
            cached
                .read()
                .await
                .clone()
                .ok_or(PresenceError::ChannelUnknown(channel_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str) -> PresenceMember {
        PresenceMember {
            id: id.into(),
            nick: None,
            display_name: Some(id.to_uppercase()),
        }
    }

    fn snapshot(members: &[&str]) -> ChannelSnapshot {
        ChannelSnapshot {
            guild_id: "g".into(),
            channel_id: "c".into(),
            channel_name: "lobby".into(),
            members: members.iter().map(|id| member(id)).collect(),
        }
    }

    #[tokio::test]
    async fn configured_channel_is_unknown_before_first_snapshot() {
        let hub = PresenceHub::new("g", "c", 8);
        assert!(matches!(
            hub.configured_channel().await,
            Err(PresenceError::ChannelUnknown(id)) if id == "c"
        ));
    }

    #[tokio::test]
    async fn voice_state_changes_fold_into_cached_snapshot() {
        let hub = PresenceHub::new("g", "c", 8);
        hub.publish_snapshot(snapshot(&["p1", "p2"])).await;

        hub.publish_voice_state(member("p3"), Some("c".into())).await;
        hub.publish_voice_state(member("p1"), None).await;
        hub.publish_voice_state(member("p2"), Some("elsewhere".into()))
            .await;

        let current = hub.configured_channel().await.unwrap();
        let ids: Vec<&str> = current.members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["p3"]);
        assert_eq!(current.channel_name, "lobby");
    }

    #[tokio::test]
    async fn join_before_first_snapshot_starts_the_cache() {
        let hub = PresenceHub::new("g", "c", 8);
        hub.publish_voice_state(member("p9"), Some("elsewhere".into()))
            .await;
        hub.publish_voice_state(member("p8"), None).await;
        assert!(hub.configured_channel().await.is_err());

        hub.publish_voice_state(member("p1"), Some("c".into())).await;
        hub.publish_voice_state(member("p2"), Some("c".into())).await;

        let current = hub.configured_channel().await.unwrap();
        assert_eq!(current.guild_id, "g");
        assert_eq!(current.channel_id, "c");
        let ids: Vec<&str> = current.members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn snapshots_of_other_channels_are_forwarded_but_not_cached() {
        let hub = PresenceHub::new("g", "c", 8);
        let mut rx = hub.subscribe();
        let other = ChannelSnapshot {
            channel_id: "other".into(),
            ..snapshot(&["p1"])
        };

        assert_eq!(hub.publish_snapshot(other.clone()).await, 1);
        assert_eq!(rx.recv().await.unwrap(), PresenceEvent::ChannelSnapshot(other));
        assert!(hub.configured_channel().await.is_err());
    }
}
