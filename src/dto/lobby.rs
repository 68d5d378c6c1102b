use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::game::{AvailablePlayer, Champion, DiscordPlayer, GamePlayer, GameState, Role};

/// Wire representation of a slot occupant. An empty `id` is an unfilled slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerView {
    /// Platform user id; empty for an unfilled slot.
    pub id: String,
    /// Display name, if known.
    pub name: Option<String>,
}

/// Champion as shown to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChampionView {
    /// Champion key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Image file name inside the versioned asset CDN.
    pub img: String,
}

/// One of the five lobby slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SlotView {
    /// Occupant.
    pub player: PlayerView,
    /// Role of the latest roll.
    pub role: Option<Role>,
    /// Champion of the latest roll.
    pub champion: Option<ChampionView>,
}

/// Participant present in the voice channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AvailablePlayerView {
    /// Platform user id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Snapshot of the lobby pushed to every viewer in `updateState` messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    /// The five slots, in order.
    pub players: Vec<SlotView>,
    /// Voice-channel members keyed by id.
    pub available_players: IndexMap<String, AvailablePlayerView>,
    /// Rolls made in the current game.
    pub roll_count: u32,
    /// Whether a game is open.
    pub game_in_progress: bool,
    /// Whether a roll is accepted right now.
    pub can_roll: bool,
    /// Milliseconds left before the next roll is expected.
    pub next_roll_timer: u64,
    /// `null` while no game is open.
    pub game_id: Option<Uuid>,
    /// Game client version used for champion images.
    pub league_version: String,
    /// Configured guild.
    pub discord_guild_id: String,
    /// Configured voice channel.
    pub discord_guild_channel_id: String,
    /// Name of the configured voice channel.
    pub discord_guild_channel_name: String,
}

impl From<&DiscordPlayer> for PlayerView {
    fn from(player: &DiscordPlayer) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
        }
    }
}

impl From<&Champion> for ChampionView {
    fn from(champion: &Champion) -> Self {
        Self {
            id: champion.id.clone(),
            name: champion.name.clone(),
            img: champion.image.clone(),
        }
    }
}

impl From<&GamePlayer> for SlotView {
    fn from(slot: &GamePlayer) -> Self {
        Self {
            player: (&slot.player).into(),
            role: slot.role,
            champion: slot.champion.as_ref().map(Into::into),
        }
    }
}

impl From<&AvailablePlayer> for AvailablePlayerView {
    fn from(player: &AvailablePlayer) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
        }
    }
}

impl From<&GameState> for GameStateView {
    fn from(state: &GameState) -> Self {
        Self {
            players: state.players.iter().map(Into::into).collect(),
            available_players: state
                .available_players
                .iter()
                .map(|(id, player)| (id.clone(), player.into()))
                .collect(),
            roll_count: state.roll_count,
            game_in_progress: state.game_in_progress,
            can_roll: state.can_roll,
            next_roll_timer: state.next_roll_timer_ms,
            game_id: state.game_id,
            league_version: state.league_version.clone(),
            discord_guild_id: state.guild_id.clone(),
            discord_guild_channel_id: state.channel_id.clone(),
            discord_guild_channel_name: state.channel_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn idle_state_serializes_with_null_game_id() {
        let view = GameStateView::from(&GameState::default());
        let value = serde_json::to_value(&view).unwrap();

        assert_eq!(value["gameId"], serde_json::Value::Null);
        assert_eq!(value["canRoll"], json!(true));
        assert_eq!(value["players"].as_array().unwrap().len(), 5);
        assert_eq!(
            value["players"][0],
            json!({"player": {"id": "", "name": null}, "role": null, "champion": null})
        );
    }

    #[test]
    fn drafted_slot_carries_role_and_champion() {
        let mut state = GameState::default();
        state.players[2] = GamePlayer {
            role: Some(Role::Jungle),
            champion: Some(Champion {
                id: "64".into(),
                name: "Lee Sin".into(),
                image: "LeeSin.png".into(),
            }),
            ..GamePlayer::occupied("p1", Some("Alice".into()))
        };

        let value = serde_json::to_value(GameStateView::from(&state)).unwrap();
        assert_eq!(value["players"][2]["role"], json!("JUNGLE"));
        assert_eq!(value["players"][2]["champion"]["img"], json!("LeeSin.png"));
        assert_eq!(value["players"][2]["player"]["name"], json!("Alice"));
    }
}
