//! Folding voice-channel presence into the lobby roster.

use futures::future::join_all;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    dao::{models::PlayerEntity, roll_store::RollStore, storage::StorageError},
    presence::{ChannelSnapshot, PresenceMember},
    state::{
        SharedState,
        game::{AvailablePlayer, GamePlayer, GameState},
    },
};

/// Outcome of a best-effort roster upsert.
#[derive(Debug, Default)]
pub struct UpsertReport {
    /// Players written successfully.
    pub saved: usize,
    /// Player id and error of every failed write.
    pub failures: Vec<(String, StorageError)>,
}

/// Build the available-player map from channel members.
///
/// Members without an id are dropped; a repeated id keeps its first position
/// and its last name.
pub fn available_from_members(members: &[PresenceMember]) -> IndexMap<String, AvailablePlayer> {
    let mut available = IndexMap::with_capacity(members.len());
    for member in members {
        if member.id.is_empty() {
            warn!(nick = ?member.nick, "presence member without id dropped");
            continue;
        }
        available.insert(
            member.id.clone(),
            AvailablePlayer {
                id: member.id.clone(),
                name: display_name(member),
            },
        );
    }
    available
}

fn display_name(member: &PresenceMember) -> String {
    match member.preferred_name() {
        Some(name) => name.to_owned(),
        None => {
            debug!(player_id = %member.id, "member has no nick nor display name");
            member.id.clone()
        }
    }
}

/// Replace the available players and, while idle, reshape the slots: absent
/// occupants are cleared, present ones get their current name.
pub fn reconcile_slots(state: &mut GameState, available: IndexMap<String, AvailablePlayer>) {
    state.available_players = available;
    if state.game_in_progress {
        return;
    }

    for slot in state.players.iter_mut().filter(|slot| slot.is_occupied()) {
        match state.available_players.get(&slot.player.id) {
            Some(player) => slot.player.name = Some(player.name.clone()),
            None => {
                info!(player_id = %slot.player.id, "player left the channel; clearing slot");
                *slot = GamePlayer::empty();
            }
        }
    }
}

/// Record a member joining the channel. While idle they take the first empty
/// slot unless already seated. Returns the slot they were placed in.
pub fn apply_join(state: &mut GameState, member: &PresenceMember) -> Option<usize> {
    if member.id.is_empty() {
        warn!("voice-state change without member id dropped");
        return None;
    }

    let player = AvailablePlayer {
        id: member.id.clone(),
        name: display_name(member),
    };
    state.available_players.insert(player.id.clone(), player.clone());

    if state.game_in_progress
        || state
            .players
            .iter()
            .any(|slot| slot.player.id == player.id)
    {
        return None;
    }

    let index = state.players.iter().position(|slot| !slot.is_occupied())?;
    state.players[index] = GamePlayer::occupied(player.id, Some(player.name));
    Some(index)
}

/// Record a member leaving the channel. While idle their slot is cleared.
/// Returns whether a slot was cleared.
pub fn apply_leave(state: &mut GameState, player_id: &str) -> bool {
    state.available_players.shift_remove(player_id);
    if state.game_in_progress {
        return false;
    }

    let mut cleared = false;
    for slot in state
        .players
        .iter_mut()
        .filter(|slot| slot.player.id == player_id)
    {
        *slot = GamePlayer::empty();
        cleared = true;
    }
    cleared
}

/// Upsert every player, collecting failures instead of stopping at the first.
pub async fn upsert_players<'a, I>(store: &dyn RollStore, players: I) -> UpsertReport
where
    I: IntoIterator<Item = &'a AvailablePlayer>,
{
    let pending = players.into_iter().map(|player| {
        let id = player.id.clone();
        let write = store.upsert_player(PlayerEntity {
            id: player.id.clone(),
            name: Some(player.name.clone()),
        });
        async move { (id, write.await) }
    });

    join_all(pending)
        .await
        .into_iter()
        .fold(UpsertReport::default(), |mut report, (id, result)| {
            match result {
                Ok(()) => report.saved += 1,
                Err(err) => report.failures.push((id, err)),
            }
            report
        })
}

/// Persist the roster when storage is up; log a single warning for failures.
async fn persist_roster<'a, I>(state: &SharedState, players: I)
where
    I: IntoIterator<Item = &'a AvailablePlayer>,
{
    let Some(store) = state.roll_store().await.filter(|_| !state.is_degraded()) else {
        warn!("storage unavailable; roster not persisted");
        return;
    };

    let report = upsert_players(store.as_ref(), players).await;
    if !report.failures.is_empty() {
        let failed: Vec<&str> = report.failures.iter().map(|(id, _)| id.as_str()).collect();
        warn!(
            saved = report.saved,
            failed = ?failed,
            error = %report.failures[0].1,
            "some roster entries could not be persisted"
        );
    }
}

/// Run the full reconciliation for a channel snapshot and commit it.
pub async fn apply_snapshot(state: &SharedState, snapshot: ChannelSnapshot) -> GameState {
    let available = available_from_members(&snapshot.members);
    persist_roster(state, available.values()).await;

    let ChannelSnapshot {
        guild_id,
        channel_id,
        channel_name,
        ..
    } = snapshot;
    let ((), committed) = state
        .lobby()
        .mutate(move |lobby| {
            lobby.guild_id = guild_id;
            lobby.channel_id = channel_id;
            // Snapshots rebuilt from voice-state changes carry no name.
            if !channel_name.is_empty() {
                lobby.channel_name = channel_name;
            }
            reconcile_slots(lobby, available);
        })
        .await;
    info!(
        available = committed.available_players.len(),
        in_progress = committed.game_in_progress,
        "roster reconciled"
    );
    committed
}

/// Apply a single member's voice-state change and commit it.
pub async fn apply_voice_state(
    state: &SharedState,
    member: PresenceMember,
    channel_id: Option<String>,
) -> GameState {
    let joined = channel_id.as_deref() == Some(state.config().channel_id.as_str());

    if joined && !member.id.is_empty() {
        let player = AvailablePlayer {
            id: member.id.clone(),
            name: display_name(&member),
        };
        persist_roster(state, [&player]).await;
    }

    let (slot, committed) = state
        .lobby()
        .mutate(|lobby| {
            if joined {
                apply_join(lobby, &member)
            } else {
                apply_leave(lobby, &member.id);
                None
            }
        })
        .await;

    if joined {
        info!(player_id = %member.id, slot = ?slot, "player joined the channel");
    } else {
        info!(player_id = %member.id, channel = ?channel_id, "player left the channel");
    }
    committed
}
