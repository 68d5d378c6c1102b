/// In-memory backend for tests and storage-less runs.
pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    ChampionEntity, GameEntity, GamePlayerEntity, GamePlayerRollEntity, PlayerEntity,
};
use crate::dao::storage::StorageResult;

pub use memory::{FailPoint, InjectedFailure, MemoryRollStore};

/// Abstraction over the persistence layer for the roster, champion pools and
/// roll history.
pub trait RollStore: Send + Sync {
    /// Insert or refresh a roster entry.
    fn upsert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Latest known game client version, if the league data was ever refreshed.
    fn latest_league_version(&self) -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// Champions owned by `player_id`, resolved against the catalogue.
    fn champions_owned_by(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<ChampionEntity>>>;
    /// Whole champion catalogue.
    fn all_champions(&self) -> BoxFuture<'static, StorageResult<Vec<ChampionEntity>>>;
    /// Champions of the current free rotation.
    fn weekly_free_champions(&self) -> BoxFuture<'static, StorageResult<Vec<ChampionEntity>>>;
    /// Open a new game record.
    fn create_game(&self) -> BoxFuture<'static, StorageResult<GameEntity>>;
    /// Record the participants of a game. Fails on a duplicate pair.
    fn create_game_players(
        &self,
        players: Vec<GamePlayerEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Record the rows of one roll. Fails when a (game, player, roll) key exists.
    fn create_game_player_rolls(
        &self,
        rolls: Vec<GamePlayerRollEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete every row of roll `roll_number` in `game_id`. Succeeds when
    /// nothing matches.
    fn delete_roll(&self, game_id: Uuid, roll_number: u32) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete the rolls, the participations and the game record of `game_id`.
    fn delete_game_cascade(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Overwrite the stored game version.
    fn replace_league_version(&self, version: String) -> BoxFuture<'static, StorageResult<()>>;
    /// Insert or refresh catalogue entries by id.
    fn upsert_champions(
        &self,
        champions: Vec<ChampionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the whole free rotation.
    fn replace_weekly_free_champions(
        &self,
        champion_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the set of champions owned by `player_id`.
    fn set_player_champions(
        &self,
        player_id: String,
        champion_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap round trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Try to restore a lost connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
