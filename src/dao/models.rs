use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::game::Champion;

/// Chat-platform participant known to the roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Platform user id.
    pub id: String,
    /// Last known name, if any.
    pub name: Option<String>,
}

/// Champion catalogue entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChampionEntity {
    /// Numeric champion key, kept as a string.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Image file name inside the versioned asset CDN.
    pub image: String,
}

/// One game session, opened by its first roll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Game identifier.
    pub id: Uuid,
    /// When the first roll opened the game.
    pub created_at: SystemTime,
}

impl GameEntity {
    /// Fresh game with a random id, created now.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: SystemTime::now(),
        }
    }
}

impl Default for GameEntity {
    fn default() -> Self {
        Self::new()
    }
}

/// Participation of a player in a game, recorded on the first roll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GamePlayerEntity {
    /// Game the player took part in.
    pub game_id: Uuid,
    /// Platform user id.
    pub player_id: String,
}

/// Draft result of one player for one roll of a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GamePlayerRollEntity {
    /// Game the roll belongs to.
    pub game_id: Uuid,
    /// Platform user id.
    pub player_id: String,
    /// 1-based roll index within the game.
    pub roll_number: u32,
    /// Wire name of the assigned role.
    pub role: String,
    /// Drawn champion key.
    pub champion_id: String,
}

impl From<ChampionEntity> for Champion {
    fn from(value: ChampionEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            image: value.image,
        }
    }
}

impl From<Champion> for ChampionEntity {
    fn from(value: Champion) -> Self {
        Self {
            id: value.id,
            name: value.name,
            image: value.image,
        }
    }
}
