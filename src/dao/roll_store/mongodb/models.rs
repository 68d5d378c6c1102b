use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    ChampionEntity, GameEntity, GamePlayerEntity, GamePlayerRollEntity, PlayerEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoChampionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub image: String,
}

/// Ownership link between a player and a champion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerChampionDocument {
    pub player_id: String,
    pub champion_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoWeeklyChampionDocument {
    #[serde(rename = "_id")]
    pub champion_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLeagueVersionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub version: String,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGamePlayerDocument {
    pub game_id: String,
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGamePlayerRollDocument {
    pub game_id: String,
    pub player_id: String,
    pub roll_number: u32,
    pub role: String,
    pub champion_id: String,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

impl From<ChampionEntity> for MongoChampionDocument {
    fn from(value: ChampionEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            image: value.image,
        }
    }
}

impl From<MongoChampionDocument> for ChampionEntity {
    fn from(value: MongoChampionDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            image: value.image,
        }
    }
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id.to_string(),
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<GamePlayerEntity> for MongoGamePlayerDocument {
    fn from(value: GamePlayerEntity) -> Self {
        Self {
            game_id: value.game_id.to_string(),
            player_id: value.player_id,
        }
    }
}

impl From<GamePlayerRollEntity> for MongoGamePlayerRollDocument {
    fn from(value: GamePlayerRollEntity) -> Self {
        Self {
            game_id: value.game_id.to_string(),
            player_id: value.player_id,
            roll_number: value.roll_number,
            role: value.role,
            champion_id: value.champion_id,
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}

pub fn game_filter(game_id: Uuid) -> Document {
    doc! {"game_id": game_id.to_string()}
}

pub fn roll_filter(game_id: Uuid, roll_number: u32) -> Document {
    doc! {"game_id": game_id.to_string(), "roll_number": i64::from(roll_number)}
}
