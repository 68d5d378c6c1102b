use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoChampionDocument, MongoGameDocument, MongoGamePlayerDocument,
        MongoGamePlayerRollDocument, MongoLeagueVersionDocument, MongoPlayerChampionDocument,
        MongoPlayerDocument, MongoWeeklyChampionDocument, doc_id, game_filter, roll_filter,
    },
};
use crate::dao::{
    models::{ChampionEntity, GameEntity, GamePlayerEntity, GamePlayerRollEntity, PlayerEntity},
    roll_store::RollStore,
    storage::StorageResult,
};

const PLAYERS: &str = "players";
const CHAMPIONS: &str = "champions";
const PLAYER_CHAMPIONS: &str = "player_champions";
const WEEKLY_CHAMPIONS: &str = "weekly_champions";
const LEAGUE_VERSIONS: &str = "league_versions";
const GAMES: &str = "games";
const GAME_PLAYERS: &str = "game_players";
const GAME_PLAYER_ROLLS: &str = "game_player_rolls";
const LATEST_VERSION_ID: &str = "latest";

/// [`crate::dao::roll_store::RollStore`] backed by MongoDB. Cloning shares the connection.
#[derive(Clone)]
pub struct MongoRollStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept so the connection pool lives as long as the database handle.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoRollStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let rolls = self
            .collection::<MongoGamePlayerRollDocument>(GAME_PLAYER_ROLLS)
            .await;
        let roll_index = IndexModel::builder()
            .keys(doc! {"game_id": 1, "player_id": 1, "roll_number": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("roll_game_player_number_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        rolls
            .create_index(roll_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_PLAYER_ROLLS,
                index: "game_id,player_id,roll_number",
                source,
            })?;

        let game_players = self
            .collection::<MongoGamePlayerDocument>(GAME_PLAYERS)
            .await;
        let game_player_index = IndexModel::builder()
            .keys(doc! {"game_id": 1, "player_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_player_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        game_players
            .create_index(game_player_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_PLAYERS,
                index: "game_id,player_id",
                source,
            })?;

        let ownership = self
            .collection::<MongoPlayerChampionDocument>(PLAYER_CHAMPIONS)
            .await;
        let ownership_index = IndexModel::builder()
            .keys(doc! {"player_id": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("player_champion_player_idx".to_owned()))
                    .build(),
            )
            .build();
        ownership
            .create_index(ownership_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: PLAYER_CHAMPIONS,
                index: "player_id",
                source,
            })?;

        Ok(())
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn upsert_player(&self, player: PlayerEntity) -> MongoResult<()> {
        let document: MongoPlayerDocument = player.into();
        self.collection::<MongoPlayerDocument>(PLAYERS)
            .await
            .replace_one(doc_id(&document.id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlayer {
                id: document.id.clone(),
                source,
            })?;
        Ok(())
    }

    async fn latest_league_version(&self) -> MongoResult<Option<String>> {
        let document = self
            .collection::<MongoLeagueVersionDocument>(LEAGUE_VERSIONS)
            .await
            .find_one(doc_id(LATEST_VERSION_ID))
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: LEAGUE_VERSIONS,
                source,
            })?;
        Ok(document.map(|doc| doc.version))
    }

    /// Resolve champion ids against the catalogue, dropping unknown ids.
    async fn champions_by_ids(&self, ids: Vec<String>) -> MongoResult<Vec<ChampionEntity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let documents: Vec<MongoChampionDocument> = self
            .collection::<MongoChampionDocument>(CHAMPIONS)
            .await
            .find(doc! {"_id": {"$in": ids}})
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: CHAMPIONS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: CHAMPIONS,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn champions_owned_by(&self, player_id: String) -> MongoResult<Vec<ChampionEntity>> {
        let links: Vec<MongoPlayerChampionDocument> = self
            .collection::<MongoPlayerChampionDocument>(PLAYER_CHAMPIONS)
            .await
            .find(doc! {"player_id": player_id})
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: PLAYER_CHAMPIONS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: PLAYER_CHAMPIONS,
                source,
            })?;
        self.champions_by_ids(links.into_iter().map(|link| link.champion_id).collect())
            .await
    }

    async fn all_champions(&self) -> MongoResult<Vec<ChampionEntity>> {
        let documents: Vec<MongoChampionDocument> = self
            .collection::<MongoChampionDocument>(CHAMPIONS)
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: CHAMPIONS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: CHAMPIONS,
                source,
            })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn weekly_free_champions(&self) -> MongoResult<Vec<ChampionEntity>> {
        let weekly: Vec<MongoWeeklyChampionDocument> = self
            .collection::<MongoWeeklyChampionDocument>(WEEKLY_CHAMPIONS)
            .await
            .find(doc! {})
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: WEEKLY_CHAMPIONS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Load {
                collection: WEEKLY_CHAMPIONS,
                source,
            })?;
        self.champions_by_ids(weekly.into_iter().map(|doc| doc.champion_id).collect())
            .await
    }

    async fn create_game(&self) -> MongoResult<GameEntity> {
        let game = GameEntity::new();
        let document: MongoGameDocument = game.clone().into();
        self.collection::<MongoGameDocument>(GAMES)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveGame {
                id: game.id,
                collection: GAMES,
                source,
            })?;
        Ok(game)
    }

    async fn create_game_players(&self, players: Vec<GamePlayerEntity>) -> MongoResult<()> {
        let Some(game_id) = players.first().map(|entry| entry.game_id) else {
            return Ok(());
        };
        let documents: Vec<MongoGamePlayerDocument> =
            players.into_iter().map(Into::into).collect();
        self.collection::<MongoGamePlayerDocument>(GAME_PLAYERS)
            .await
            .insert_many(&documents)
            .await
            .map_err(|source| MongoDaoError::SaveGame {
                id: game_id,
                collection: GAME_PLAYERS,
                source,
            })?;
        Ok(())
    }

    async fn create_game_player_rolls(&self, rolls: Vec<GamePlayerRollEntity>) -> MongoResult<()> {
        let Some(game_id) = rolls.first().map(|roll| roll.game_id) else {
            return Ok(());
        };
        let documents: Vec<MongoGamePlayerRollDocument> =
            rolls.into_iter().map(Into::into).collect();
        self.collection::<MongoGamePlayerRollDocument>(GAME_PLAYER_ROLLS)
            .await
            .insert_many(&documents)
            .await
            .map_err(|source| MongoDaoError::SaveGame {
                id: game_id,
                collection: GAME_PLAYER_ROLLS,
                source,
            })?;
        Ok(())
    }

    async fn delete_roll(&self, game_id: Uuid, roll_number: u32) -> MongoResult<()> {
        self.collection::<MongoGamePlayerRollDocument>(GAME_PLAYER_ROLLS)
            .await
            .delete_many(roll_filter(game_id, roll_number))
            .await
            .map_err(|source| MongoDaoError::DeleteGame {
                id: game_id,
                collection: GAME_PLAYER_ROLLS,
                source,
            })?;
        Ok(())
    }

    async fn delete_game_cascade(&self, game_id: Uuid) -> MongoResult<()> {
        self.collection::<MongoGamePlayerRollDocument>(GAME_PLAYER_ROLLS)
            .await
            .delete_many(game_filter(game_id))
            .await
            .map_err(|source| MongoDaoError::DeleteGame {
                id: game_id,
                collection: GAME_PLAYER_ROLLS,
                source,
            })?;
        self.collection::<MongoGamePlayerDocument>(GAME_PLAYERS)
            .await
            .delete_many(game_filter(game_id))
            .await
            .map_err(|source| MongoDaoError::DeleteGame {
                id: game_id,
                collection: GAME_PLAYERS,
                source,
            })?;
        self.collection::<MongoGameDocument>(GAMES)
            .await
            .delete_one(doc_id(&game_id.to_string()))
            .await
            .map_err(|source| MongoDaoError::DeleteGame {
                id: game_id,
                collection: GAMES,
                source,
            })?;
        Ok(())
    }

    async fn replace_league_version(&self, version: String) -> MongoResult<()> {
        let document = MongoLeagueVersionDocument {
            id: LATEST_VERSION_ID.to_owned(),
            version,
            updated_at: DateTime::now(),
        };
        self.collection::<MongoLeagueVersionDocument>(LEAGUE_VERSIONS)
            .await
            .replace_one(doc_id(LATEST_VERSION_ID), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: LEAGUE_VERSIONS,
                source,
            })?;
        Ok(())
    }

    async fn upsert_champions(&self, champions: Vec<ChampionEntity>) -> MongoResult<()> {
        let collection = self.collection::<MongoChampionDocument>(CHAMPIONS).await;
        for champion in champions {
            let document: MongoChampionDocument = champion.into();
            collection
                .replace_one(doc_id(&document.id), &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Write {
                    collection: CHAMPIONS,
                    source,
                })?;
        }
        Ok(())
    }

    async fn replace_weekly_free_champions(&self, champion_ids: Vec<String>) -> MongoResult<()> {
        let collection = self
            .collection::<MongoWeeklyChampionDocument>(WEEKLY_CHAMPIONS)
            .await;
        collection
            .delete_many(doc! {})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: WEEKLY_CHAMPIONS,
                source,
            })?;
        if champion_ids.is_empty() {
            return Ok(());
        }
        let documents: Vec<MongoWeeklyChampionDocument> = champion_ids
            .into_iter()
            .map(|champion_id| MongoWeeklyChampionDocument { champion_id })
            .collect();
        collection
            .insert_many(&documents)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: WEEKLY_CHAMPIONS,
                source,
            })?;
        Ok(())
    }

    async fn set_player_champions(
        &self,
        player_id: String,
        champion_ids: Vec<String>,
    ) -> MongoResult<()> {
        let collection = self
            .collection::<MongoPlayerChampionDocument>(PLAYER_CHAMPIONS)
            .await;
        collection
            .delete_many(doc! {"player_id": player_id.as_str()})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PLAYER_CHAMPIONS,
                source,
            })?;
        if champion_ids.is_empty() {
            return Ok(());
        }
        let documents: Vec<MongoPlayerChampionDocument> = champion_ids
            .into_iter()
            .map(|champion_id| MongoPlayerChampionDocument {
                player_id: player_id.clone(),
                champion_id,
            })
            .collect();
        collection
            .insert_many(&documents)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PLAYER_CHAMPIONS,
                source,
            })?;
        Ok(())
    }
}

impl RollStore for MongoRollStore {
    fn upsert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_player(player).await.map_err(Into::into) })
    }

    fn latest_league_version(&self) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        Box::pin(async move { store.latest_league_version().await.map_err(Into::into) })
    }

    fn champions_owned_by(
        &self,
        player_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<ChampionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .champions_owned_by(player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn all_champions(&self) -> BoxFuture<'static, StorageResult<Vec<ChampionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.all_champions().await.map_err(Into::into) })
    }

    fn weekly_free_champions(&self) -> BoxFuture<'static, StorageResult<Vec<ChampionEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.weekly_free_champions().await.map_err(Into::into) })
    }

    fn create_game(&self) -> BoxFuture<'static, StorageResult<GameEntity>> {
        let store = self.clone();
        Box::pin(async move { store.create_game().await.map_err(Into::into) })
    }

    fn create_game_players(
        &self,
        players: Vec<GamePlayerEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.create_game_players(players).await.map_err(Into::into) })
    }

    fn create_game_player_rolls(
        &self,
        rolls: Vec<GamePlayerRollEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .create_game_player_rolls(rolls)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_roll(&self, game_id: Uuid, roll_number: u32) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_roll(game_id, roll_number)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_game_cascade(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_game_cascade(game_id).await.map_err(Into::into) })
    }

    fn replace_league_version(&self, version: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_league_version(version)
                .await
                .map_err(Into::into)
        })
    }

    fn upsert_champions(
        &self,
        champions: Vec<ChampionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.upsert_champions(champions).await.map_err(Into::into) })
    }

    fn replace_weekly_free_champions(
        &self,
        champion_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_weekly_free_champions(champion_ids)
                .await
                .map_err(Into::into)
        })
    }

    fn set_player_champions(
        &self,
        player_id: String,
        champion_ids: Vec<String>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .set_player_champions(player_id, champion_ids)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
