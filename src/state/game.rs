//! In-memory lobby model: the five player slots, the voice-channel roster and
//! the process-wide game state they live in.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Number of slots in a lobby. Every roll hands out exactly one role per slot.
pub const SLOT_COUNT: usize = 5;

/// Lane assignment handed out by a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Bottom lane carry.
    Adc,
    /// Jungler.
    Jungle,
    /// Bottom lane support.
    Support,
    /// Top lane.
    Top,
    /// Middle lane.
    Mid,
}

impl Role {
    /// The fixed role set, in canonical order.
    pub const ALL: [Role; SLOT_COUNT] = [Role::Adc, Role::Jungle, Role::Support, Role::Top, Role::Mid];

    /// Persisted / wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Adc => "ADC",
            Role::Jungle => "JUNGLE",
            Role::Support => "SUPPORT",
            Role::Top => "TOP",
            Role::Mid => "MID",
        }
    }
}

/// Champion as known by the draft: identifier, display name and image file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Champion {
    /// Champion key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Image file name.
    pub image: String,
}

/// Occupant of a slot. An empty `id` marks an unfilled slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscordPlayer {
    /// Platform user id; empty for an unfilled slot.
    pub id: String,
    /// Display name, if known.
    pub name: Option<String>,
}

impl DiscordPlayer {
    /// Whether this is the unfilled placeholder.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// One of the five positions of the lobby.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GamePlayer {
    /// Occupant.
    pub player: DiscordPlayer,
    /// Role of the latest roll.
    pub role: Option<Role>,
    /// Champion of the latest roll.
    pub champion: Option<Champion>,
}

impl GamePlayer {
    /// An unfilled slot with no draft result.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Slot occupied by `player`, without any draft result yet.
    pub fn occupied(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            player: DiscordPlayer {
                id: id.into(),
                name,
            },
            role: None,
            champion: None,
        }
    }

    /// Whether a player holds the slot.
    pub fn is_occupied(&self) -> bool {
        !self.player.is_empty()
    }

    /// Drop the role and champion while keeping the occupant.
    pub fn clear_draft(&mut self) {
        self.role = None;
        self.champion = None;
    }
}

/// Participant currently present in the configured voice channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailablePlayer {
    /// Platform user id.
    pub id: String,
    /// Resolved display name.
    pub name: String,
}

/// Singleton lobby state shared by every viewer.
///
/// `players` is a fixed-size array so the slot count can never drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    /// The five slots, in order.
    pub players: [GamePlayer; SLOT_COUNT],
    /// Voice-channel members keyed by id, in arrival order.
    pub available_players: IndexMap<String, AvailablePlayer>,
    /// Rolls made in the current game.
    pub roll_count: u32,
    /// Whether a game is open.
    pub game_in_progress: bool,
    /// Whether a roll is accepted right now.
    pub can_roll: bool,
    /// Milliseconds left on the roll countdown.
    pub next_roll_timer_ms: u64,
    /// Current game, set by its first roll.
    pub game_id: Option<Uuid>,
    /// Game client version used for champion images.
    pub league_version: String,
    /// Configured guild.
    pub guild_id: String,
    /// Configured voice channel.
    pub channel_id: String,
    /// Name of the configured voice channel.
    pub channel_name: String,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            players: std::array::from_fn(|_| GamePlayer::empty()),
            available_players: IndexMap::new(),
            roll_count: 0,
            game_in_progress: false,
            can_roll: true,
            next_roll_timer_ms: 0,
            game_id: None,
            league_version: String::new(),
            guild_id: String::new(),
            channel_id: String::new(),
            channel_name: String::new(),
        }
    }
}

/// Broken state invariant detected before a mutation is committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Game flag and roll count disagree.
    #[error("gameInProgress is {in_progress} while rollCount is {roll_count}")]
    ProgressMismatch {
        /// Value of the game flag.
        in_progress: bool,
        /// Value of the roll counter.
        roll_count: u32,
    },
    /// Some slots have a role and others do not, or a role repeats.
    #[error("roll roles are not a permutation of the role set")]
    RolesNotPermutation,
    /// The same champion sits in two slots.
    #[error("champion `{0}` is assigned to more than one slot")]
    DuplicateChampion(String),
}

impl GameState {
    /// Ids of the occupied slots, in slot order.
    pub fn occupied_ids(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|slot| slot.is_occupied())
            .map(|slot| slot.player.id.clone())
            .collect()
    }

    /// Return to the idle lobby: counters and draft results are cleared, slots
    /// whose occupant left the channel are emptied.
    pub fn reset_round(&mut self) {
        self.game_in_progress = false;
        self.roll_count = 0;
        self.next_roll_timer_ms = 0;
        self.can_roll = true;
        self.game_id = None;

        for slot in self.players.iter_mut() {
            if self.available_players.contains_key(&slot.player.id) {
                slot.clear_draft();
            } else {
                *slot = GamePlayer::empty();
            }
        }
    }

    /// Count the roll timer down, flooring at zero.
    pub fn tick(&mut self, elapsed_ms: u64) {
        self.next_roll_timer_ms = self.next_roll_timer_ms.saturating_sub(elapsed_ms);
    }

    /// Check the invariants that must hold after every committed mutation.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.game_in_progress != (self.roll_count > 0) {
            return Err(InvariantViolation::ProgressMismatch {
                in_progress: self.game_in_progress,
                roll_count: self.roll_count,
            });
        }

        let roles: Vec<Role> = self.players.iter().filter_map(|slot| slot.role).collect();
        if !roles.is_empty() {
            let distinct: HashSet<Role> = roles.iter().copied().collect();
            if roles.len() != SLOT_COUNT || distinct.len() != SLOT_COUNT {
                return Err(InvariantViolation::RolesNotPermutation);
            }
        }

        let mut seen = HashSet::new();
        for champion in self.players.iter().filter_map(|slot| slot.champion.as_ref()) {
            if !seen.insert(champion.id.as_str()) {
                return Err(InvariantViolation::DuplicateChampion(champion.id.clone()));
            }
        }

        Ok(())
    }
}

/// Pad or truncate `slots` to exactly [`SLOT_COUNT`] entries.
pub fn fixed_slots(slots: impl IntoIterator<Item = GamePlayer>) -> [GamePlayer; SLOT_COUNT] {
    let mut iter = slots.into_iter();
    std::array::from_fn(|_| iter.next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available(ids: &[&str]) -> IndexMap<String, AvailablePlayer> {
        ids.iter()
            .map(|id| {
                (
                    id.to_string(),
                    AvailablePlayer {
                        id: id.to_string(),
                        name: id.to_uppercase(),
                    },
                )
            })
            .collect()
    }

    fn champion(id: &str) -> Champion {
        Champion {
            id: id.into(),
            name: format!("champion {id}"),
            image: format!("{id}.png"),
        }
    }

    #[test]
    fn default_state_has_five_empty_slots() {
        let state = GameState::default();
        assert_eq!(state.players.len(), SLOT_COUNT);
        assert!(state.players.iter().all(|slot| !slot.is_occupied()));
        assert!(state.can_roll);
        assert!(state.check_invariants().is_ok());
    }

    #[test]
    fn fixed_slots_pads_and_truncates() {
        let padded = fixed_slots(vec![GamePlayer::occupied("p1", None)]);
        assert_eq!(padded[0].player.id, "p1");
        assert!(padded[1..].iter().all(|slot| !slot.is_occupied()));

        let truncated = fixed_slots((0..8).map(|i| GamePlayer::occupied(format!("p{i}"), None)));
        assert_eq!(truncated[4].player.id, "p4");
    }

    #[test]
    fn reset_round_keeps_present_occupants_only() {
        let mut state = GameState {
            available_players: available(&["p1"]),
            roll_count: 2,
            game_in_progress: true,
            can_roll: false,
            next_roll_timer_ms: 4_000,
            game_id: Some(Uuid::new_v4()),
            ..GameState::default()
        };
        state.players[0] = GamePlayer {
            role: Some(Role::Top),
            champion: Some(champion("1")),
            ..GamePlayer::occupied("p1", Some("P1".into()))
        };
        state.players[1] = GamePlayer {
            role: Some(Role::Mid),
            champion: Some(champion("2")),
            ..GamePlayer::occupied("p2", Some("P2".into()))
        };

        state.reset_round();

        assert_eq!(state.players[0].player.id, "p1");
        assert_eq!(state.players[0].role, None);
        assert_eq!(state.players[0].champion, None);
        assert!(!state.players[1].is_occupied());
        assert_eq!(state.roll_count, 0);
        assert!(!state.game_in_progress);
        assert!(state.can_roll);
        assert_eq!(state.next_roll_timer_ms, 0);
        assert_eq!(state.game_id, None);
    }

    #[test]
    fn reset_round_is_idempotent() {
        let mut state = GameState {
            available_players: available(&["p1", "p2"]),
            roll_count: 1,
            game_in_progress: true,
            can_roll: false,
            ..GameState::default()
        };
        state.players[0] = GamePlayer::occupied("p1", None);
        state.players[3] = GamePlayer::occupied("gone", None);

        state.reset_round();
        let once = state.clone();
        state.reset_round();
        assert_eq!(state, once);
    }

    #[test]
    fn tick_floors_at_zero() {
        let mut state = GameState {
            next_roll_timer_ms: 1_500,
            ..GameState::default()
        };
        state.tick(1_000);
        assert_eq!(state.next_roll_timer_ms, 500);
        state.tick(1_000);
        assert_eq!(state.next_roll_timer_ms, 0);
    }

    #[test]
    fn invariants_reject_progress_mismatch() {
        let state = GameState {
            game_in_progress: true,
            ..GameState::default()
        };
        assert!(matches!(
            state.check_invariants(),
            Err(InvariantViolation::ProgressMismatch { .. })
        ));
    }

    #[test]
    fn invariants_reject_partial_roles_and_duplicate_champions() {
        let mut state = GameState::default();
        state.players[0].role = Some(Role::Top);
        assert_eq!(
            state.check_invariants(),
            Err(InvariantViolation::RolesNotPermutation)
        );

        let mut state = GameState::default();
        state.players[0].champion = Some(champion("7"));
        state.players[1].champion = Some(champion("7"));
        assert_eq!(
            state.check_invariants(),
            Err(InvariantViolation::DuplicateChampion("7".into()))
        );
    }
}
